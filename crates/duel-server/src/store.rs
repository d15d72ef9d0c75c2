//! JSON-file-backed card definition store.
//!
//! Cards live in memory in a [`BTreeMap`] keyed by id and are mirrored to
//! a single JSON file (a pretty-printed array sorted by id). Every
//! mutation writes the complete file to a sibling temp file and renames
//! it over the original, so readers of the file never see a partial
//! write. The in-memory map only changes once the write succeeded.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use duel_types::CardDefinition;
use tracing::{debug, info};

/// Errors from the card store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("card file {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a valid card list.
    #[error("card file {} is not valid JSON: {source}", path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// No card with this id exists.
    #[error("card `{id}` not found")]
    NotFound {
        /// The requested id.
        id: String,
    },

    /// A card with this id already exists.
    #[error("card `{id}` already exists")]
    Duplicate {
        /// The conflicting id.
        id: String,
    },

    /// The card failed validation.
    #[error("invalid card: {message}")]
    Invalid {
        /// What is wrong with it.
        message: String,
    },
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Invalid {
        message: message.into(),
    }
}

/// Check the fields every stored card must satisfy.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for a blank id or name, or a zero `hp`.
pub fn validate(card: &CardDefinition) -> Result<(), StoreError> {
    if card.id.trim().is_empty() {
        return Err(invalid("id must not be empty"));
    }
    if card.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if card.hp == Some(0) {
        return Err(invalid("hp must be positive"));
    }
    Ok(())
}

/// Whether a [`CardStore::put`] created a card or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The id was new.
    Created,
    /// An existing card was replaced.
    Replaced,
}

/// Card definitions mirrored to a JSON file.
#[derive(Debug)]
pub struct CardStore {
    path: PathBuf,
    cards: BTreeMap<String, CardDefinition>,
}

impl CardStore {
    /// Load the store from `path`. A missing file yields an empty store;
    /// the file is created on the first mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read,
    /// or [`StoreError::Json`] if it does not hold a card array.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cards = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let list: Vec<CardDefinition> =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
                        path: path.clone(),
                        source,
                    })?;
                list.into_iter().map(|c| (c.id.clone(), c)).collect()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No card file yet, starting empty");
                BTreeMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!(path = %path.display(), cards = cards.len(), "Card store loaded");
        Ok(Self { path, cards })
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All cards in id order.
    pub fn list(&self) -> Vec<CardDefinition> {
        self.cards.values().cloned().collect()
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Look up one card.
    pub fn get(&self, id: &str) -> Option<&CardDefinition> {
        self.cards.get(id)
    }

    /// Add a new card.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`], [`StoreError::Duplicate`] if the id
    /// is taken, or [`StoreError::Io`] if the file cannot be written.
    pub async fn create(&mut self, card: CardDefinition) -> Result<(), StoreError> {
        validate(&card)?;
        if self.cards.contains_key(&card.id) {
            return Err(StoreError::Duplicate { id: card.id });
        }
        let mut next = self.cards.clone();
        next.insert(card.id.clone(), card);
        self.commit(next).await
    }

    /// Store `card` under `id`, replacing any existing card.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the card fails validation or its
    /// id differs from `id`, or [`StoreError::Io`] if the file cannot be
    /// written.
    pub async fn put(&mut self, id: &str, card: CardDefinition) -> Result<PutOutcome, StoreError> {
        validate(&card)?;
        if card.id != id {
            return Err(invalid(format!("body id `{}` does not match path id `{id}`", card.id)));
        }
        let mut next = self.cards.clone();
        let outcome = match next.insert(card.id.clone(), card) {
            Some(_) => PutOutcome::Replaced,
            None => PutOutcome::Created,
        };
        self.commit(next).await?;
        Ok(outcome)
    }

    /// Remove a card and return it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent, or [`StoreError::Io`]
    /// if the file cannot be written.
    pub async fn delete(&mut self, id: &str) -> Result<CardDefinition, StoreError> {
        let mut next = self.cards.clone();
        let removed = next.remove(id).ok_or_else(|| StoreError::NotFound { id: id.to_owned() })?;
        self.commit(next).await?;
        Ok(removed)
    }

    /// Persist `next` and make it current.
    async fn commit(&mut self, next: BTreeMap<String, CardDefinition>) -> Result<(), StoreError> {
        let list: Vec<&CardDefinition> = next.values().collect();
        let json = serde_json::to_vec_pretty(&list).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        debug!(path = %self.path.display(), cards = next.len(), "Card file written");
        self.cards = next;
        Ok(())
    }
}
