//! facepatch replaces a square region of a photo with a generated face and shows a before/after
//! wipe of the result.
//!
//! The pipeline, leaf first:
//!
//! - [`Viewport`] maps pointer positions on the displayed image to native pixels
//! - [`SquareSelector`] turns a drag into a square [`SelectionBox`]
//! - [`extract`] crops the selection for the generation call
//! - [`GenerationClient`] is the boundary to the external image service
//! - [`composite()`] feathers the returned patch back into the photo
//! - [`render_compare`] draws the wipe view
//!
//! [`EditSession`] ties the stages together and guards against stale asynchronous results.
#![forbid(unsafe_code)]

pub mod compare;
pub mod composite;
pub mod foundation;
pub mod generate;
pub mod geometry;
pub mod raster;
pub mod select;
pub mod session;

pub use crate::compare::renderer::{CompareRenderer, CompareState, render_compare};
pub use crate::composite::feather::{composite, composite_with_ratio};
pub use crate::composite::mask::FeatherMask;
pub use crate::foundation::config::SessionOpts;
pub use crate::foundation::core::{NativePoint, Point, Rect, SelectionBox};
pub use crate::foundation::error::{PatchError, PatchResult};
pub use crate::generate::client::{GenerationClient, GenerationError, GenerationInput};
pub use crate::generate::retry::{RetryPolicy, generate_with_retry};
pub use crate::geometry::viewport::Viewport;
pub use crate::raster::bitmap::{Bitmap, ContentKey};
pub use crate::raster::cache::{DecodeCache, SourceKey};
pub use crate::raster::crop::extract;
pub use crate::raster::decode::{decode_bitmap, encode_png};
pub use crate::select::selector::{
    GestureEvent, SelectionChange, SelectorState, SquareRules, SquareSelector,
};
pub use crate::session::edit_session::{
    EditSession, GenerationOutcome, GenerationRequest, GenerationTicket,
};
