// pinmark services
// Stateless or settings-driven functionality: the API client and its HTTP and
// credential seams, tag sanitization, content-derived suggestions, settings.

pub mod credentials;
pub mod http_transport;
pub mod page_extractor;
pub mod pinboard_client;
pub mod sanitizer;
pub mod settings_engine;
pub mod tag_suggester;
