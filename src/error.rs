use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of the runtime type engine: metadata blob parsing,
/// type interning, class layout and vtable construction, generic instantiation and class
/// initialization. Each variant provides specific context about the failure mode so callers
/// can distinguish fatal metadata corruption from recorded, repeatable initialization failures.
///
/// # Error Categories
///
/// ## Metadata corruption (fatal for the operation in progress)
/// - [`Error::Malformed`] - Corrupted or inconsistent metadata blob content
/// - [`Error::OutOfBounds`] - Table or heap access beyond the valid range
/// - [`Error::NotSupported`] - Blob sanity/version constants do not match
/// - [`Error::Empty`] - Empty input provided
///
/// ## Type system errors
/// - [`Error::TypeNotFound`] - A referenced type definition does not exist
/// - [`Error::TypeError`] - General type system operation error
/// - [`Error::RecursionLimit`] - Type graph nesting exceeded the safety limit
///
/// ## Runtime errors
/// - [`Error::TypeInitFailed`] - A recorded static-constructor failure, re-surfaced on
///   every subsequent use of the class (never retried)
/// - [`Error::OutOfMemory`] - The injected allocator reported exhaustion
/// - [`Error::LockError`] - Thread synchronization failure
#[derive(Error, Debug)]
pub enum Error {
    /// The metadata blob is damaged and could not be parsed.
    ///
    /// This error indicates that the blob structure is corrupted or internally
    /// inconsistent. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading metadata.
    ///
    /// This error occurs when a table index is outside `[0, row_count)` or a heap
    /// read would run past the end of the blob. It is a safety check; the reader
    /// never fails silently on a bad index.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This blob is not supported.
    ///
    /// Indicates that the sanity or version constants in the metadata header do not
    /// match the values this engine expects.
    #[error("This metadata format is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while mapping a metadata blob
    /// from disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The injected allocator failed to satisfy an allocation request.
    ///
    /// Allocation failures propagate; the engine never aborts on its own.
    #[error("Allocation of {size} bytes (align {align}) failed")]
    OutOfMemory {
        /// Requested allocation size in bytes
        size: usize,
        /// Requested alignment in bytes
        align: usize,
    },

    /// Failed to find a type definition.
    ///
    /// The associated value is the type-definition row (or type-table index) that
    /// could not be resolved.
    #[error("Failed to find type definition - {0}")]
    TypeNotFound(u32),

    /// General error during type system usage.
    ///
    /// Covers type system operations that can fail, such as generic argument
    /// substitution or vtable construction, where no more specific variant applies.
    #[error("{0}")]
    TypeError(String),

    /// A class initializer failed, and the recorded failure is being re-surfaced.
    ///
    /// The static constructor ran exactly once; every later attempt to use the
    /// class observes this same error without the constructor running again.
    #[error("The type initializer for '{class}' threw an exception: {message}")]
    TypeInitFailed {
        /// Full name of the class whose initializer failed
        class: String,
        /// Failure message recorded from the first (and only) initializer run
        message: String,
    },

    /// Recursion limit reached.
    ///
    /// Type descriptors and value-type field graphs are finite in valid metadata;
    /// hitting this limit means the metadata encodes a cycle or absurd nesting.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when a lock
    /// is poisoned by a panicking initializer on another thread.
    #[error("Failed to lock target")]
    LockError,
}
