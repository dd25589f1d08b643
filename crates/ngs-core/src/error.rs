/// Alias for `Result<T, NgsError>`.
pub type NgsResult<T> = Result<T, NgsError>;

/// Errors surfaced by the core lookup and catalog operations.
///
/// These are returned to the calling stage, which decides whether the
/// failure is fatal and records it in the diagnostic collector with the
/// proper source location.
#[derive(Debug, thiserror::Error)]
pub enum NgsError {
    /// A name could not be resolved through any symbol layer.
    #[error("unknown symbol: \"{0}\"")]
    UnknownSymbol(String),

    /// A literal could not be parsed as a number in any accepted base.
    #[error("malformed number: \"{0}\"")]
    BadNumber(String),

    /// An expression had no terms, or a dangling operator.
    #[error("empty term in expression: \"{0}\"")]
    EmptyTerm(String),

    /// A plugin name was bound to two different ids.
    #[error("plugin \"{name}\" already bound to id {bound}, cannot rebind to {requested}")]
    PluginRebound {
        /// The plugin name being rebound.
        name: String,
        /// The id it is already bound to.
        bound: u16,
        /// The conflicting id from the new binding.
        requested: u16,
    },

    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path of the file that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
