//! Spotcheck error types.

use std::sync::Arc;

/// Error type for the plumbing around a retrieval check.
///
/// A failed retrieval is not an error: the engine folds every
/// retrieval failure into the outcome record it reports. This type
/// covers the operations that have no outcome row to land in, such as
/// round discovery, provider identity resolution, and measurement
/// submission.
///
/// Collaborator stubs in tests replay canned `Result`s, so the whole
/// type is `Clone`; the captured source error is shared behind an
/// `Arc` to keep that cheap.
#[derive(Clone)]
pub struct ScError {
    ctx: Arc<str>,
    src: Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
}

impl ScError {
    /// Construct an error from a display context.
    pub fn new<C: std::fmt::Display>(ctx: C) -> Self {
        Self {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: None,
        }
    }

    /// Construct an error wrapping a source error.
    pub fn with_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: Some(Arc::new(src)),
        }
    }
}

impl std::fmt::Display for ScError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ctx)?;
        if let Some(src) = &self.src {
            write!(f, ": {src}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ScError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScError")
            .field("ctx", &self.ctx)
            .field("src", &self.src)
            .finish()
    }
}

impl std::error::Error for ScError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_deref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = s;
            out
        })
    }
}

/// The core spotcheck result type.
pub type ScResult<T> = Result<T, ScError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn context_and_source_render() {
        assert_eq!(
            "round discovery failed",
            ScError::new("round discovery failed").to_string(),
        );
        assert_eq!(
            "submit failed: offline",
            ScError::with_src(
                "submit failed",
                std::io::Error::other("offline"),
            )
            .to_string(),
        );
    }

    #[test]
    fn canned_results_clone() {
        let canned: ScResult<String> = Err(ScError::with_src(
            "rpc down",
            std::io::Error::other("refused"),
        ));
        let replayed = canned.clone();

        let err = replayed.unwrap_err();
        assert_eq!("rpc down: refused", err.to_string());
        // the source survives the clone and stays inspectable
        assert_eq!(
            "refused",
            std::error::Error::source(&err).unwrap().to_string(),
        );
    }
}
