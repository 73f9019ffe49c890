pub mod api_client;
pub mod cache;
pub mod collection_editor;
pub mod form_errors;
pub mod reservation_form;
pub mod scan_feed;
pub mod session;
pub mod transition;

pub use api_client::*;
pub use cache::*;
pub use collection_editor::*;
pub use form_errors::*;
pub use reservation_form::*;
pub use scan_feed::*;
pub use session::*;
pub use transition::*;
