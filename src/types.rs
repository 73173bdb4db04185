//! Core types for share-dl

use serde::{Deserialize, Serialize};

/// Opaque identifier of a node in the remote share
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new NodeId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a remote node, as reported by the metadata service
///
/// The wire values are the short POSIX-style tags the service emits
/// (`reg` for regular files, `dir` for directories, `lnk` for symlinks).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// Regular file
    #[serde(rename = "reg", alias = "REG")]
    File,
    /// Directory
    #[serde(rename = "dir", alias = "DIR")]
    Directory,
    /// Symbolic link
    #[serde(rename = "lnk", alias = "LNK", alias = "symlnk", alias = "SYMLNK")]
    Symlink,
}

/// Basic attributes of a remote node
///
/// For directories, `size` is the cumulative size of the subtree; the
/// largest size observed during discovery doubles as the expected byte
/// total of the whole run.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeAttributes {
    /// Node name (final path component)
    pub name: String,
    /// Node kind
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Node size in bytes, when the service reports one
    #[serde(default)]
    pub size: Option<u64>,
}

/// Successful result of one transfer attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Bytes were fetched and the file was promoted to its final name
    Completed,
    /// The final file already existed on disk; nothing was fetched
    Existing,
    /// A previous run had already staged every byte; only the final
    /// rename was performed
    AlreadyStaged,
}
