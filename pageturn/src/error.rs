use facet::Facet;

/// Why a navigation could not be completed in place.
///
/// Every variant ends the same way for the user: the session falls back to
/// a native browser navigation.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum NavigateError {
    /// network error: {message}
    Network { message: String },

    /// response is not HTML (content-type {content_type})
    NotHtml { content_type: String },

    /// invalid URL: {url}
    InvalidUrl { url: String },

    /// cross-origin URL: {url}
    CrossOrigin { url: String },

    /// server requested a full page load
    Vetoed,

    /// live document has no root element
    NoRootElement,
}

impl NavigateError {
    pub fn network(message: impl Into<String>) -> Self {
        NavigateError::Network {
            message: message.into(),
        }
    }

    /// `InvalidUrl` carrying the text that failed to parse
    pub fn invalid_url(url: impl Into<String>) -> Self {
        NavigateError::InvalidUrl { url: url.into() }
    }
}
