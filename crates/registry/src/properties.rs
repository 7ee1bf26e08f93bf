//! Boot-time properties distribution.
//!
//! The configuration document is a JSON object whose top-level members are
//! named sections. Each section with a registered reader is decoded into an
//! immutable [`PropertiesObject`] and pushed, in registration order, to every
//! [`PropertiesConsumer`]. Consumers pick the kinds they care about with
//! [`PropertiesObject::get`].
//!
//! Sections without a reader are skipped so older firmware accepts newer
//! documents. A section that fails to decode is skipped as a whole; no
//! partially decoded object ever reaches a consumer.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use svc_bus::PropertyTypeId;
use thiserror::Error;

/// A strongly typed configuration object.
pub trait Properties: Any + Send + Sync + fmt::Debug {
    const ID: PropertyTypeId;
}

#[derive(Error, Debug)]
pub enum PropertiesError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed configuration document: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("configuration document root is not an object")]
    NotAnObject,
    #[error("section `{section}` is malformed: {source}")]
    Decode {
        section: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decoded, immutable configuration object shared by every consumer.
#[derive(Clone)]
pub struct PropertiesObject {
    id: PropertyTypeId,
    section: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl PropertiesObject {
    pub fn new<P: Properties>(section: &str, value: P) -> Self {
        Self {
            id: P::ID,
            section: Arc::from(section),
            value: Arc::new(value),
        }
    }

    pub fn id(&self) -> PropertyTypeId {
        self.id
    }

    /// Name of the document section this object was decoded from.
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Borrows the object as `P` when both its id and its concrete type
    /// match.
    pub fn get<P: Properties>(&self) -> Option<&P> {
        if self.id != P::ID {
            return None;
        }
        self.value.downcast_ref::<P>()
    }

    /// Like [`get`](Self::get) but hands out shared ownership, for consumers
    /// that keep the object past the callback.
    pub fn shared<P: Properties>(&self) -> Option<Arc<P>> {
        if self.id != P::ID {
            return None;
        }
        Arc::clone(&self.value).downcast::<P>().ok()
    }
}

impl fmt::Debug for PropertiesObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesObject")
            .field("id", &self.id)
            .field("section", &self.section)
            .finish_non_exhaustive()
    }
}

pub trait PropertiesConsumer: Send + Sync {
    fn apply_properties(&self, props: &PropertiesObject);
}

pub type ConsumerRef = Arc<dyn PropertiesConsumer>;

impl<T> PropertiesConsumer for Weak<T>
where
    T: PropertiesConsumer + Send + Sync,
{
    fn apply_properties(&self, props: &PropertiesObject) {
        if let Some(target) = self.upgrade() {
            target.apply_properties(props);
        }
    }
}

/// Consumer that only reacts to objects of kind `P`.
pub struct TypedConsumer<P, F> {
    callback: F,
    _kind: PhantomData<fn(&P)>,
}

impl<P, F> TypedConsumer<P, F>
where
    P: Properties,
    F: Fn(&P) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _kind: PhantomData,
        }
    }
}

impl<P, F> PropertiesConsumer for TypedConsumer<P, F>
where
    P: Properties,
    F: Fn(&P) + Send + Sync,
{
    fn apply_properties(&self, props: &PropertiesObject) {
        if let Some(props) = props.get::<P>() {
            (self.callback)(props);
        }
    }
}

/// Decoder for one named section: receives the section name and its JSON
/// value.
pub type PropertiesReader =
    Arc<dyn Fn(&str, &Value) -> Result<PropertiesObject, PropertiesError> + Send + Sync>;

/// Reader decoding a section with `serde`. Unknown fields are ignored; fields
/// the type marks `#[serde(default)]` may be absent.
pub fn json_reader<P>() -> PropertiesReader
where
    P: Properties + DeserializeOwned,
{
    Arc::new(|section: &str, value: &Value| {
        let props = P::deserialize(value).map_err(|source| PropertiesError::Decode {
            section: section.to_owned(),
            source,
        })?;
        Ok(PropertiesObject::new(section, props))
    })
}

/// Outcome of one [`PropertiesLoader::load`], by section name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Default)]
pub struct PropertiesLoader {
    readers: RwLock<HashMap<String, PropertiesReader>>,
    consumers: RwLock<Vec<ConsumerRef>>,
}

impl PropertiesLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the decoder for `section`. A later registration for the
    /// same name replaces the earlier one.
    pub fn add_reader(&self, section: &str, reader: PropertiesReader) {
        self.readers.write().insert(section.to_owned(), reader);
    }

    pub fn add_json_reader<P>(&self, section: &str)
    where
        P: Properties + DeserializeOwned,
    {
        self.add_reader(section, json_reader::<P>());
    }

    pub fn add_consumer(&self, consumer: ConsumerRef) {
        self.consumers.write().push(consumer);
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    /// Reads and applies the document at `path`.
    ///
    /// A missing or unparseable document is returned as an error and no
    /// consumer is called. Section-level problems never fail the load; they
    /// show up in the returned [`LoadReport`].
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadReport, PropertiesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PropertiesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&text)
    }

    pub fn load_str(&self, document: &str) -> Result<LoadReport, PropertiesError> {
        let document: Value = serde_json::from_str(document).map_err(PropertiesError::Parse)?;
        match document {
            Value::Object(sections) => Ok(self.apply_sections(&sections)),
            _ => Err(PropertiesError::NotAnObject),
        }
    }

    fn apply_sections(&self, sections: &Map<String, Value>) -> LoadReport {
        let mut report = LoadReport::default();
        for (name, value) in sections {
            info!(target: "props", "read props: {name}");
            if !value.is_object() {
                debug!(target: "props", "section `{name}` is not an object, skipped");
                report.skipped.push(name.clone());
                continue;
            }

            let reader = self.readers.read().get(name).cloned();
            let Some(reader) = reader else {
                debug!(target: "props", "no reader for `{name}`, skipped");
                report.skipped.push(name.clone());
                continue;
            };

            match reader(name, value) {
                Ok(props) => {
                    self.publish(&props);
                    report.applied.push(name.clone());
                }
                Err(err) => {
                    warn!(target: "props", "{err}");
                    report.failed.push(name.clone());
                }
            }
        }
        report
    }

    /// Pushes `props` to every consumer in registration order.
    pub fn publish(&self, props: &PropertiesObject) {
        let consumers = self.consumers.read().clone();
        for consumer in &consumers {
            let applied =
                panic::catch_unwind(AssertUnwindSafe(|| consumer.apply_properties(props)));
            if applied.is_err() {
                error!(target: "props", "consumer panicked applying {}", props.id());
            }
        }
    }
}
