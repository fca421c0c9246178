//! Accumulator module for the GeoNames indexer pipeline.
//!
//! Groups mapped documents into batches bounded by document count and
//! estimated request size.

use geonames_indexer_shared::GeonameDocument;
use tracing::trace;

/// An ordered group of documents submitted in one bulk request.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Position of the batch in the stream, starting at 0.
    pub sequence: u64,
    /// Source line number of each document, parallel to `documents`.
    pub lines: Vec<u64>,
    pub documents: Vec<GeonameDocument>,
    /// Sum of the documents' estimated sizes.
    pub estimated_bytes: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// `(line, id)` pairs for every document, in order.
    pub fn keys(&self) -> Vec<(u64, u64)> {
        self.lines
            .iter()
            .zip(&self.documents)
            .map(|(line, doc)| (*line, doc.id))
            .collect()
    }
}

/// Buffers documents and cuts them into batches.
///
/// A batch is emitted as soon as it holds `max_documents` documents or its
/// estimated size reaches `max_bytes`, whichever comes first. `flush`
/// emits whatever is buffered, for end of stream or an explicit request.
/// Documents keep their arrival order within and across batches.
#[derive(Debug)]
pub struct BatchAccumulator {
    max_documents: usize,
    max_bytes: usize,
    lines: Vec<u64>,
    documents: Vec<GeonameDocument>,
    bytes: usize,
    next_sequence: u64,
}

impl BatchAccumulator {
    /// Create an accumulator. Limits of zero are treated as one.
    pub fn new(max_documents: usize, max_bytes: usize) -> Self {
        let max_documents = max_documents.max(1);
        Self {
            max_documents,
            max_bytes: max_bytes.max(1),
            lines: Vec::with_capacity(max_documents),
            documents: Vec::with_capacity(max_documents),
            bytes: 0,
            next_sequence: 0,
        }
    }

    /// Add a document read from `line`. Returns a batch if a threshold was reached.
    pub fn push(&mut self, line: u64, document: GeonameDocument) -> Option<Batch> {
        self.bytes += document.estimated_size();
        self.lines.push(line);
        self.documents.push(document);

        if self.documents.len() >= self.max_documents || self.bytes >= self.max_bytes {
            self.flush()
        } else {
            None
        }
    }

    /// Emit the buffered documents, if any.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.documents.is_empty() {
            return None;
        }

        let batch = Batch {
            sequence: self.next_sequence,
            lines: std::mem::replace(&mut self.lines, Vec::with_capacity(self.max_documents)),
            documents: std::mem::replace(&mut self.documents, Vec::with_capacity(self.max_documents)),
            estimated_bytes: std::mem::take(&mut self.bytes),
        };
        self.next_sequence += 1;

        trace!(
            sequence = batch.sequence,
            count = batch.len(),
            bytes = batch.estimated_bytes,
            "Batch ready"
        );
        Some(batch)
    }

    /// Number of documents currently buffered.
    pub fn pending(&self) -> usize {
        self.documents.len()
    }
}
