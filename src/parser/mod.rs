pub mod articles;
pub mod blocks;
pub mod summary;

use blocks::{BlockSource, ContentBlock};

use crate::error::PipelineError;

/// Flatten one page and re-group its lines into articles. Also returns the
/// number of flattened lines for the run report.
pub async fn page_to_articles<S: BlockSource>(
    source: &S,
    blocks: Vec<ContentBlock>,
) -> Result<(usize, Vec<articles::Article>), PipelineError> {
    let lines = blocks::flatten(source, blocks, 0).await?;
    Ok((lines.len(), articles::segment(&lines)))
}
