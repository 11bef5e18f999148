use log::info;
use serde::Serialize;
use std::cmp::Ordering;
use std::error::Error as StdError;
use std::sync::Arc;

use super::chunker::{ split_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE };
use super::loader::Document;
use super::IndexError;
use crate::llm::embedding::EmbeddingClient;

/// One embedded passage of a source document.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub similarity_top_k: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embed_batch_size: 10,
            similarity_top_k: 2,
        }
    }
}

/// In-memory vector index over document passages. Read-only once built.
pub struct VectorIndex {
    nodes: Vec<Node>,
    document_count: usize,
    embedder: Arc<dyn EmbeddingClient>,
    settings: IndexSettings,
}

impl VectorIndex {
    pub async fn from_documents(
        documents: Vec<Document>,
        embedder: Arc<dyn EmbeddingClient>,
        settings: IndexSettings
    ) -> Result<Self, IndexError> {
        let document_count = documents.len();
        let mut nodes = Vec::new();
        for doc in &documents {
            for (chunk_index, text) in split_text(&doc.text, settings.chunk_size, settings.chunk_overlap)
                .into_iter()
                .enumerate() {
                nodes.push(Node {
                    id: format!("{}#{}", doc.id, chunk_index),
                    document_id: doc.id.clone(),
                    source: doc.source.clone(),
                    chunk_index,
                    text,
                    embedding: Vec::new(),
                });
            }
        }

        if nodes.is_empty() {
            return Err(IndexError::EmptyIndex);
        }

        let batch_size = settings.embed_batch_size.max(1);
        for batch in nodes.chunks_mut(batch_size) {
            let texts: Vec<String> = batch
                .iter()
                .map(|n| n.text.clone())
                .collect();
            let embeddings = embedder
                .embed_batch(&texts).await
                .map_err(|e| IndexError::Embedding(e.to_string()))?;
            if embeddings.len() != batch.len() {
                return Err(
                    IndexError::Embedding(
                        format!("expected {} vectors, got {}", batch.len(), embeddings.len())
                    )
                );
            }
            for (node, embedding) in batch.iter_mut().zip(embeddings) {
                node.embedding = embedding;
            }
        }

        info!("Indexed {} document(s) into {} node(s)", document_count, nodes.len());

        Ok(Self { nodes, document_count, embedder, settings })
    }

    /// Embeds `query` and returns the `top_k` most similar nodes, best first.
    /// Equal scores keep index order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize
    ) -> Result<Vec<ScoredNode>, Box<dyn StdError + Send + Sync>> {
        let query_embedding = self.embedder.embed(query).await?.embedding;
        Ok(self.search(&query_embedding, top_k))
    }

    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<ScoredNode> {
        let mut ranked: Vec<(usize, f32)> = self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i, cosine_similarity(query_embedding, &node.embedding)))
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked
            .into_iter()
            .take(top_k)
            .map(|(i, score)| ScoredNode { node: self.nodes[i].clone(), score })
            .collect()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }
}

/// Returns 0.0 for mismatched lengths or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| x * y)
        .sum();
    let magnitude_a: f32 = a
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    let magnitude_b: f32 = b
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

pub fn format_documents_for_prompt(hits: &[ScoredNode]) -> String {
    if hits.is_empty() {
        return "No relevant documents found.".to_string();
    }

    hits.iter()
        .map(|hit| format!("file_name: {}\n\n{}", hit.node.source, hit.node.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ doc, KeywordEmbedder };

    #[test]
    fn cosine_similarity_edges() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn builds_nodes_and_embeds_in_batches() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let settings = IndexSettings { chunk_size: 8, chunk_overlap: 0, embed_batch_size: 2, ..IndexSettings::default() };
        let docs = vec![
            doc("leave.md", "Annual leave is twenty days per year. Carry over is capped at five days."),
            doc("travel.md", "Book travel through the portal.")
        ];
        let index = VectorIndex::from_documents(docs, embedder.clone(), settings).await.unwrap();

        assert_eq!(index.document_count(), 2);
        assert!(index.nodes().len() >= 3);
        assert!(index.nodes().iter().all(|n| !n.embedding.is_empty()));
        assert_eq!(index.nodes()[0].id, "leave.md#0");
        let expected_batches = (index.nodes().len() + 1) / 2;
        assert_eq!(embedder.batch_calls(), expected_batches);
    }

    #[tokio::test]
    async fn retrieve_ranks_relevant_passages_first() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let docs = vec![
            doc("travel.md", "Book travel through the portal and keep receipts."),
            doc("leave.md", "Annual leave policy: employees receive twenty days of leave."),
            doc("security.md", "Lock your laptop when leaving your desk.")
        ];
        let index = VectorIndex::from_documents(docs, embedder, IndexSettings::default()).await.unwrap();

        let hits = index.retrieve("What is the leave policy?", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node.document_id, "leave.md");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn search_keeps_index_order_on_ties_and_stops_at_top_k() {
        let docs = vec![
            doc("a.md", "Remote work is allowed."),
            doc("b.md", "Remote work is allowed."),
            doc("c.md", "Expense claims need receipts.")
        ];
        let index = VectorIndex::from_documents(
            docs,
            Arc::new(KeywordEmbedder::default()),
            IndexSettings::default()
        ).await.unwrap();
        let query = index.nodes()[0].embedding.clone();

        let ids: Vec<_> = index
            .search(&query, 2)
            .into_iter()
            .map(|hit| hit.node.document_id)
            .collect();
        assert_eq!(ids, vec!["a.md", "b.md"]);
        assert_eq!(index.search(&query, 10).len(), 3);
        assert!(index.search(&query, 0).is_empty());
    }

    #[tokio::test]
    async fn documents_without_text_cannot_be_indexed() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let result = VectorIndex::from_documents(
            vec![doc("empty.txt", "   ")],
            embedder,
            IndexSettings::default()
        ).await;
        assert!(matches!(result, Err(IndexError::EmptyIndex)));
    }

    #[test]
    fn context_block_names_sources() {
        let hit = ScoredNode {
            score: 0.9,
            node: Node {
                id: "leave.md#0".into(),
                document_id: "leave.md".into(),
                source: "leave.md".into(),
                chunk_index: 0,
                text: "Twenty days.".into(),
                embedding: vec![],
            },
        };
        let text = format_documents_for_prompt(&[hit]);
        assert_eq!(text, "file_name: leave.md\n\nTwenty days.");
        assert_eq!(format_documents_for_prompt(&[]), "No relevant documents found.");
    }
}
