//! File-backed document sink.
//!
//! Each persisted document becomes a human-readable key/value text file named
//! `document_<uuid>.txt` inside the configured directory.

use crate::application::ports::{Ack, DocumentSink, PersistError};
use crate::domain::document::{Document, Product};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Writes every document to its own text file.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Create a sink writing into `dir`.
    ///
    /// The directory is created on first use if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the sink writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentSink for FileSink {
    async fn persist(&self, document: &Document, signature: &str) -> Result<Ack, PersistError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(format!("document_{}.txt", Uuid::new_v4()));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        file.write_all(render_document(document, signature).as_bytes())
            .await?;
        file.flush().await?;

        tracing::trace!(artifact = %path.display(), "document written");
        Ok(Ack::new(path))
    }
}

/// Render a document and its signature as a key/value text block.
pub fn render_document(document: &Document, signature: &str) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "Registration number: {}", document.reg_number);
    let _ = writeln!(out, "Production date: {}", document.production_date);
    let _ = writeln!(
        out,
        "Description: {}",
        document.description_inn().unwrap_or_default()
    );
    let _ = writeln!(out, "Document type: {}", document.doc_type);
    let _ = writeln!(out, "Document ID: {}", document.doc_id);
    let _ = writeln!(out, "Owner INN: {}", document.owner_inn);
    let _ = writeln!(out, "Products: {}", document.products.len());
    for (index, product) in document.products.iter().enumerate() {
        render_product(&mut out, index + 1, product);
    }
    let _ = writeln!(out, "Registration date: {}", document.reg_date);
    let _ = writeln!(out, "Participant INN: {}", document.participant_inn);
    let _ = writeln!(out, "Document status: {}", document.doc_status);
    let _ = writeln!(out, "Import request: {}", document.import_request);
    let _ = writeln!(out, "Production type: {}", document.production_type);
    let _ = writeln!(out, "Producer INN: {}", document.producer_inn);
    let _ = write!(out, "Signature: {}", signature);

    out
}

fn render_product(out: &mut String, position: usize, product: &Product) {
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();

    let _ = writeln!(out, "  [{}]", position);
    let _ = writeln!(
        out,
        "    Certificate document: {}",
        optional(&product.certificate_document)
    );
    let _ = writeln!(
        out,
        "    Certificate document date: {}",
        optional(&product.certificate_document_date)
    );
    let _ = writeln!(
        out,
        "    Certificate document number: {}",
        optional(&product.certificate_document_number)
    );
    let _ = writeln!(out, "    Owner INN: {}", product.owner_inn);
    let _ = writeln!(out, "    Producer INN: {}", product.producer_inn);
    let _ = writeln!(out, "    Production date: {}", product.production_date);
    let _ = writeln!(out, "    TNVED code: {}", product.tnved_code);
    let _ = writeln!(out, "    UIT code: {}", optional(&product.uit_code));
    let _ = writeln!(out, "    UITU code: {}", optional(&product.uitu_code));
}
