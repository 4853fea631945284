//! Deterministic in-process backend.
//!
//! Replies are chosen by substring rules over the request's text parts,
//! first match wins, with a default reply otherwise. Failure rules are
//! checked before reply rules, so a failure can be layered over an existing
//! script. Every call, upload and
//! delete is recorded so callers can assert on what the pipeline sent.
//!
//! ```rust
//! use paper2post::model::{ContentPart, GenerativeModel, ScriptedModel};
//!
//! # tokio_test::block_on(async {
//! let model = ScriptedModel::new("default")
//!     .reply_when("Extract the title", "Attention Is All You Need");
//! let title = model
//!     .generate(&[ContentPart::text("Extract the title of this paper")])
//!     .await
//!     .unwrap();
//! assert_eq!(title, "Attention Is All You Need");
//! assert_eq!(model.calls().len(), 1);
//! # });
//! ```

use super::{mime_type_for, ContentPart, FileStager, GenerativeModel, StagedFile};
use crate::error::ModelError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<Vec<ContentPart>>,
    uploads: Vec<PathBuf>,
    deleted: Vec<String>,
    live: HashSet<String>,
    next_id: usize,
}

/// A [`ModelBackend`](super::ModelBackend) that answers from a fixed script.
#[derive(Debug)]
pub struct ScriptedModel {
    default_reply: String,
    rules: Vec<Rule>,
    failing_uploads: Vec<String>,
    failing_deletes: bool,
    journal: Mutex<Journal>,
}

impl ScriptedModel {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            default_reply: default_reply.into(),
            rules: Vec::new(),
            failing_uploads: Vec::new(),
            failing_deletes: false,
            journal: Mutex::new(Journal::default()),
        }
    }

    /// Reply with `reply` when the request text contains `needle`.
    pub fn reply_when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Text(reply.into()),
        });
        self
    }

    /// Fail with an API error when the request text contains `needle`.
    ///
    /// Takes precedence over every [`reply_when`](Self::reply_when) rule,
    /// whichever was registered first.
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        let at = self
            .rules
            .iter()
            .take_while(|r| matches!(r.reply, Reply::Fail(_)))
            .count();
        self.rules.insert(at, Rule {
            needle: needle.into(),
            reply: Reply::Fail(message.into()),
        });
        self
    }

    /// Fail uploads of files whose name contains `fragment`.
    pub fn fail_upload_of(mut self, fragment: impl Into<String>) -> Self {
        self.failing_uploads.push(fragment.into());
        self
    }

    /// Fail every delete request.
    pub fn fail_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every generation request received, in order.
    pub fn calls(&self) -> Vec<Vec<ContentPart>> {
        self.journal().calls.clone()
    }

    /// The text parts of every request, joined with newlines.
    pub fn prompts(&self) -> Vec<String> {
        self.journal().calls.iter().map(|parts| request_text(parts)).collect()
    }

    /// Paths of every upload attempt, including failed ones.
    pub fn uploads(&self) -> Vec<PathBuf> {
        self.journal().uploads.clone()
    }

    /// Names of every delete request, including failed ones.
    pub fn deleted(&self) -> Vec<String> {
        self.journal().deleted.clone()
    }

    /// Names of staged files not yet deleted.
    pub fn live_files(&self) -> Vec<String> {
        let mut live: Vec<String> = self.journal().live.iter().cloned().collect();
        live.sort();
        live
    }
}

fn request_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(ContentPart::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, ModelError> {
        let text = request_text(parts);
        {
            let mut journal = self.journal();
            for part in parts {
                if let ContentPart::File(f) = part {
                    if !journal.live.contains(&f.name) {
                        return Err(ModelError::UnknownFile(f.name.clone()));
                    }
                }
            }
            journal.calls.push(parts.to_vec());
        }

        let reply = self
            .rules
            .iter()
            .find(|r| text.contains(&r.needle))
            .map(|r| r.reply.clone())
            .unwrap_or_else(|| Reply::Text(self.default_reply.clone()));

        match reply {
            Reply::Text(t) => Ok(t),
            Reply::Fail(message) => Err(ModelError::Api {
                status: 500,
                message,
            }),
        }
    }
}

#[async_trait]
impl FileStager for ScriptedModel {
    async fn upload(&self, path: &Path) -> Result<StagedFile, ModelError> {
        let mut journal = self.journal();
        journal.uploads.push(path.to_path_buf());

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_uploads.iter().any(|f| file_name.contains(f.as_str())) {
            return Err(ModelError::Api {
                status: 503,
                message: format!("upload of {file_name} rejected"),
            });
        }

        journal.next_id += 1;
        let name = format!("files/{}", journal.next_id);
        journal.live.insert(name.clone());

        Ok(StagedFile {
            uri: format!("scripted://{name}"),
            name,
            mime_type: mime_type_for(path).to_string(),
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ModelError> {
        let mut journal = self.journal();
        journal.deleted.push(name.to_string());
        if self.failing_deletes {
            return Err(ModelError::Api {
                status: 500,
                message: format!("delete of {name} rejected"),
            });
        }
        if journal.live.remove(name) {
            Ok(())
        } else {
            Err(ModelError::UnknownFile(name.to_string()))
        }
    }
}
