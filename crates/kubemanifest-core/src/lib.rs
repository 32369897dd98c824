//! kubemanifest core - object model and identity for manifest reconciliation
//!
//! This crate provides the cluster-independent types:
//! - `ResourceObject`: one remote resource as an ordered value tree
//! - `ObjectRef`: its identity, encoded as a `namespace::groupVersion::kind::name` key
//! - `GroupVersionKind`: resource type identification
//! - `decode_manifest`: YAML/JSON manifest text to a `ResourceObject`

pub mod error;
pub mod gvk;
pub mod key;
pub mod manifest;
pub mod object;
pub mod value;

pub use error::{CoreError, Result};
pub use gvk::{GroupVersion, GroupVersionKind};
pub use key::{KEY_SEPARATOR, ObjectRef, split_key};
pub use manifest::decode_manifest;
pub use object::{DEFAULT_NAMESPACE, ResourceObject};
pub use value::ValueExt;
