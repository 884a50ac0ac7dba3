// Image inspection helpers: header sniffing, catalogs, previews
pub mod catalog;
pub mod dimensions;
pub mod encoding;

pub use catalog::{convert_formats, upscale_models, DEFAULT_UPSCALE_MODEL};
pub use dimensions::{dimensions_from_bytes, read_dimensions, sniff};
pub use encoding::{mime_type_for, read_base64, read_data_url};
