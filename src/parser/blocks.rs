use tracing::warn;

use crate::error::PipelineError;

/// Deepest child level expanded below a page before the run is aborted.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Quote,
    Heading(u8),
    BulletItem,
    NumberedItem,
    Other,
}

impl BlockKind {
    pub fn from_type(name: &str) -> Self {
        match name {
            "paragraph" => BlockKind::Paragraph,
            "quote" => BlockKind::Quote,
            "heading_1" => BlockKind::Heading(1),
            "heading_2" => BlockKind::Heading(2),
            "heading_3" => BlockKind::Heading(3),
            "bulleted_list_item" => BlockKind::BulletItem,
            "numbered_list_item" => BlockKind::NumberedItem,
            _ => BlockKind::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentBlock {
    pub id: String,
    pub kind: BlockKind,
    pub text: String,
    pub has_children: bool,
}

/// Anything that can list the children of a block, fully paginated.
pub trait BlockSource {
    async fn list_children(&self, block_id: &str) -> anyhow::Result<Vec<ContentBlock>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
}

/// Consecutive list items waiting to be rendered at one depth.
#[derive(Default)]
struct ListBuffer {
    kind: Option<ListKind>,
    items: Vec<String>,
}

impl ListBuffer {
    fn push(&mut self, kind: ListKind, text: &str, depth: usize, out: &mut Vec<String>) {
        if self.kind.is_some_and(|k| k != kind) {
            self.flush(depth, out);
        }
        self.kind = Some(kind);
        self.items.push(text.to_string());
    }

    fn flush(&mut self, depth: usize, out: &mut Vec<String>) {
        let Some(kind) = self.kind.take() else {
            return;
        };
        let chain = "->".repeat(depth);
        for (i, item) in self.items.drain(..).enumerate() {
            let line = match (kind, depth) {
                (ListKind::Bulleted, 0) => format!("- {}", item),
                (ListKind::Bulleted, _) => format!("{} {}", chain, item),
                (ListKind::Numbered, 0) => format!("{}. {}", i + 1, item),
                (ListKind::Numbered, _) => format!("{} {}. {}", chain, i + 1, item),
            };
            out.push(line);
        }
    }
}

/// One level of the traversal: the remaining siblings and their list state.
struct Frame {
    blocks: std::vec::IntoIter<ContentBlock>,
    depth: usize,
    list: ListBuffer,
}

impl Frame {
    fn new(blocks: Vec<ContentBlock>, depth: usize) -> Self {
        Frame {
            blocks: blocks.into_iter(),
            depth,
            list: ListBuffer::default(),
        }
    }
}

/// Flatten a block tree into annotated lines, expanding children depth-first
/// right after their parent. Uses an explicit stack so nesting is bounded by
/// `MAX_DEPTH` rather than the call stack.
pub async fn flatten<S: BlockSource>(
    source: &S,
    blocks: Vec<ContentBlock>,
    depth: usize,
) -> Result<Vec<String>, PipelineError> {
    let mut out = Vec::new();
    let mut stack = vec![Frame::new(blocks, depth)];

    while let Some(frame) = stack.last_mut() {
        let Some(block) = frame.blocks.next() else {
            frame.list.flush(frame.depth, &mut out);
            stack.pop();
            continue;
        };

        let text = block.text.trim();
        if text.is_empty() {
            continue;
        }

        match block.kind {
            BlockKind::Paragraph => {
                frame.list.flush(frame.depth, &mut out);
                out.push(text.to_string());
            }
            BlockKind::Quote => {
                frame.list.flush(frame.depth, &mut out);
                out.push(format!("> {}", text));
            }
            BlockKind::Heading(level) => {
                frame.list.flush(frame.depth, &mut out);
                out.push(format!("{} {}", "#".repeat(level as usize), text));
            }
            BlockKind::BulletItem => frame.list.push(ListKind::Bulleted, text, frame.depth, &mut out),
            BlockKind::NumberedItem => frame.list.push(ListKind::Numbered, text, frame.depth, &mut out),
            BlockKind::Other => {}
        }

        if !block.has_children {
            continue;
        }

        let child_depth = frame.depth + 1;
        if child_depth > MAX_DEPTH {
            return Err(PipelineError::DepthExceeded {
                depth: child_depth,
                limit: MAX_DEPTH,
            });
        }

        match source.list_children(&block.id).await {
            Ok(children) => {
                frame.list.flush(frame.depth, &mut out);
                stack.push(Frame::new(children, child_depth));
            }
            Err(e) => {
                let err = PipelineError::PartialFetch {
                    block_id: block.id.clone(),
                    message: format!("{:#}", e),
                };
                warn!("{}", err);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySource {
        children: HashMap<String, Vec<ContentBlock>>,
    }

    impl MemorySource {
        fn with(mut self, parent: &str, blocks: Vec<ContentBlock>) -> Self {
            self.children.insert(parent.to_string(), blocks);
            self
        }
    }

    impl BlockSource for MemorySource {
        async fn list_children(&self, block_id: &str) -> anyhow::Result<Vec<ContentBlock>> {
            self.children
                .get(block_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 for {}", block_id))
        }
    }

    fn block(id: &str, kind: BlockKind, text: &str) -> ContentBlock {
        ContentBlock {
            id: id.to_string(),
            kind,
            text: text.to_string(),
            has_children: false,
        }
    }

    fn parent(id: &str, kind: BlockKind, text: &str) -> ContentBlock {
        ContentBlock {
            has_children: true,
            ..block(id, kind, text)
        }
    }

    async fn run(source: &MemorySource, blocks: Vec<ContentBlock>) -> Vec<String> {
        flatten(source, blocks, 0).await.unwrap()
    }

    #[tokio::test]
    async fn headings_quotes_paragraphs() {
        let blocks = vec![
            block("a", BlockKind::Heading(1), "2025-06-04"),
            block("b", BlockKind::Heading(2), "Codex"),
            block("c", BlockKind::Heading(3), "Details"),
            block("d", BlockKind::Quote, "quoted"),
            block("e", BlockKind::Paragraph, "plain"),
        ];
        let lines = run(&MemorySource::default(), blocks).await;
        assert_eq!(lines, vec!["# 2025-06-04", "## Codex", "### Details", "> quoted", "plain"]);
    }

    #[tokio::test]
    async fn bullets_coalesce_before_paragraph() {
        let blocks = vec![
            block("1", BlockKind::BulletItem, "one"),
            block("2", BlockKind::BulletItem, "two"),
            block("3", BlockKind::BulletItem, "three"),
            block("4", BlockKind::Paragraph, "after"),
        ];
        let lines = run(&MemorySource::default(), blocks).await;
        assert_eq!(lines, vec!["- one", "- two", "- three", "after"]);
    }

    #[tokio::test]
    async fn list_kind_change_flushes() {
        let blocks = vec![
            block("1", BlockKind::BulletItem, "dot"),
            block("2", BlockKind::NumberedItem, "first"),
            block("3", BlockKind::NumberedItem, "second"),
            block("4", BlockKind::BulletItem, "dot again"),
        ];
        let lines = run(&MemorySource::default(), blocks).await;
        assert_eq!(lines, vec!["- dot", "1. first", "2. second", "- dot again"]);
    }

    #[tokio::test]
    async fn trailing_list_flushed_at_end() {
        let blocks = vec![block("1", BlockKind::NumberedItem, "only")];
        let lines = run(&MemorySource::default(), blocks).await;
        assert_eq!(lines, vec!["1. only"]);
    }

    #[tokio::test]
    async fn empty_text_skipped() {
        let blocks = vec![
            block("1", BlockKind::Paragraph, "   "),
            block("2", BlockKind::Paragraph, "kept"),
        ];
        let lines = run(&MemorySource::default(), blocks).await;
        assert_eq!(lines, vec!["kept"]);
    }

    #[tokio::test]
    async fn children_follow_parent_before_siblings() {
        let source = MemorySource::default().with(
            "p",
            vec![
                block("c1", BlockKind::BulletItem, "nested a"),
                block("c2", BlockKind::NumberedItem, "nested b"),
            ],
        );
        let blocks = vec![
            block("0", BlockKind::BulletItem, "before"),
            parent("p", BlockKind::BulletItem, "parent"),
            block("s", BlockKind::Paragraph, "sibling"),
        ];
        let lines = run(&source, blocks).await;
        assert_eq!(
            lines,
            vec!["- before", "- parent", "-> nested a", "-> 1. nested b", "sibling"]
        );
    }

    #[tokio::test]
    async fn grandchildren_get_longer_chain() {
        let source = MemorySource::default()
            .with("p", vec![parent("c", BlockKind::BulletItem, "child")])
            .with("c", vec![block("g", BlockKind::BulletItem, "grandchild")]);
        let blocks = vec![parent("p", BlockKind::Paragraph, "top")];
        let lines = run(&source, blocks).await;
        assert_eq!(lines, vec!["top", "-> child", "->-> grandchild"]);
    }

    #[tokio::test]
    async fn other_kind_with_text_still_expands_children() {
        let source =
            MemorySource::default().with("t", vec![block("c", BlockKind::Paragraph, "inside toggle")]);
        let blocks = vec![parent("t", BlockKind::Other, "toggle label")];
        let lines = run(&source, blocks).await;
        assert_eq!(lines, vec!["inside toggle"]);
    }

    #[tokio::test]
    async fn failed_child_fetch_is_omitted() {
        let blocks = vec![
            parent("missing", BlockKind::Paragraph, "parent"),
            block("s", BlockKind::Paragraph, "sibling"),
        ];
        let lines = run(&MemorySource::default(), blocks).await;
        assert_eq!(lines, vec!["parent", "sibling"]);
    }

    #[tokio::test]
    async fn reading_order_preserved_for_non_list_lines() {
        let source = MemorySource::default().with(
            "h",
            vec![
                block("x", BlockKind::Paragraph, "p2"),
                block("y", BlockKind::BulletItem, "li"),
                block("z", BlockKind::Quote, "q3"),
            ],
        );
        let blocks = vec![
            block("a", BlockKind::Paragraph, "p1"),
            parent("h", BlockKind::Heading(2), "h1"),
            block("b", BlockKind::Paragraph, "p4"),
        ];
        let lines = run(&source, blocks).await;
        let non_list: Vec<&str> = lines
            .iter()
            .map(String::as_str)
            .filter(|l| !l.starts_with("->") && !l.starts_with("- "))
            .collect();
        assert_eq!(non_list, vec!["p1", "## h1", "p2", "> q3", "p4"]);
    }

    #[tokio::test]
    async fn depth_cap_is_a_hard_error() {
        let mut source = MemorySource::default();
        for i in 0..=MAX_DEPTH {
            source = source.with(
                &format!("n{}", i),
                vec![parent(&format!("n{}", i + 1), BlockKind::Paragraph, "deeper")],
            );
        }
        let blocks = vec![parent("n0", BlockKind::Paragraph, "root")];
        let err = flatten(&source, blocks, 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::DepthExceeded { limit: MAX_DEPTH, .. }));
    }

    #[test]
    fn kind_from_type_names() {
        assert_eq!(BlockKind::from_type("heading_2"), BlockKind::Heading(2));
        assert_eq!(BlockKind::from_type("bulleted_list_item"), BlockKind::BulletItem);
        assert_eq!(BlockKind::from_type("toggle"), BlockKind::Other);
    }
}
