use std::fmt::{Debug, Display};

/// Log, rather than propagate, an error that the caller has no better use for.
/// The success value, if any, is passed on.
pub trait OrLog<T> {
    fn or_log(self, context: impl Display) -> Option<T>;

    fn or_warn(self, context: impl Display) -> Option<T>;
}

impl<T, E: Debug> OrLog<T> for Result<T, E> {
    fn or_log(self, context: impl Display) -> Option<T> {
        self.map_err(|error| tracing::error!(?error, "{}", context))
            .ok()
    }

    fn or_warn(self, context: impl Display) -> Option<T> {
        self.map_err(|error| tracing::warn!(?error, "{}", context))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_success_through() {
        let ok: Result<u32, String> = Ok(3);
        assert_eq!(ok.or_log("unused"), Some(3));

        let failed: Result<u32, String> = Err("broken".to_string());
        assert_eq!(failed.or_warn("expected in test"), None);
    }
}
