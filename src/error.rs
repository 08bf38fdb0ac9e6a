use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failure reported by a [`ContentLoader`](crate::ContentLoader).
#[derive(Debug)]
pub enum LoadError {
    /// The asset exists but does not hold a tile map
    WrongType {
        /// Asset name without extension
        asset: String,
        /// What the asset holds instead
        found: String,
    },
    /// The asset is malformed or cannot be decoded
    Decode {
        /// Asset name without extension
        asset: String,
        /// Decoder diagnostic
        message: String,
    },
    /// The asset (or one it references) could not be read
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// Anything the loader could not classify
    Other(anyhow::Error),
}

impl LoadError {
    /// `Decode` error for `asset` with `message` rendered to text.
    pub fn decode(asset: impl Into<String>, message: impl fmt::Display) -> Self {
        LoadError::Decode {
            asset: asset.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::WrongType { asset, found } => {
                write!(f, "Asset '{}' is not a tile map (found {})", asset, found)
            }
            LoadError::Decode { asset, message } => {
                write!(f, "Could not decode asset '{}': {}", asset, message)
            }
            LoadError::Io { path, source } => {
                write!(f, "I/O error reading {}: {}", path.display(), source)
            }
            LoadError::Other(err) => write!(f, "{:#}", err),
        }
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for LoadError {
    fn from(err: anyhow::Error) -> Self {
        LoadError::Other(err)
    }
}

/// Failure while writing the TMX document for one map.
#[derive(Debug)]
pub enum EmitError {
    /// A tile object points at a tileset index the map does not have
    UnknownTileset {
        /// Offending object
        object_id: u32,
        /// Tileset index it names
        tileset: usize,
    },
    /// A tile-layer cell holds a GID no tileset covers
    UnresolvedTile {
        /// Layer name
        layer: String,
        /// Row-major cell index
        index: usize,
        /// Cell value
        gid: u32,
    },
    /// XML writer error
    Xml(xml::writer::Error),
    /// Output file could not be created or flushed
    Io {
        /// Output file
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::UnknownTileset { object_id, tileset } => write!(
                f,
                "Object {} references unknown tileset #{}",
                object_id, tileset
            ),
            EmitError::UnresolvedTile { layer, index, gid } => write!(
                f,
                "Cell {} of layer '{}' holds GID {} which no tileset covers",
                index, layer, gid
            ),
            EmitError::Xml(err) => write!(f, "XML write error: {}", err),
            EmitError::Io { path, source } => {
                write!(f, "I/O error writing {}: {}", path.display(), source)
            }
        }
    }
}

impl error::Error for EmitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            EmitError::Xml(err) => Some(err),
            EmitError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<xml::writer::Error> for EmitError {
    fn from(err: xml::writer::Error) -> Self {
        EmitError::Xml(err)
    }
}

/// Everything that can end the processing of one input file.
#[derive(Debug)]
pub enum RecoverError {
    /// Acquiring the map failed
    Load(LoadError),
    /// Writing the map failed
    Emit(EmitError),
}

impl fmt::Display for RecoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoverError::Load(err) => err.fmt(f),
            RecoverError::Emit(err) => err.fmt(f),
        }
    }
}

impl error::Error for RecoverError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            RecoverError::Load(err) => err.source(),
            RecoverError::Emit(err) => err.source(),
        }
    }
}

impl From<LoadError> for RecoverError {
    fn from(err: LoadError) -> Self {
        RecoverError::Load(err)
    }
}

impl From<EmitError> for RecoverError {
    fn from(err: EmitError) -> Self {
        RecoverError::Emit(err)
    }
}
