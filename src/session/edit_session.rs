//! One editing session: reference photo, source face, square selection, generated patch, and the
//! derived composite and comparison view.
//!
//! The session is single-threaded and event driven. Long operations (the generation call) run
//! outside it: [`EditSession::begin_generation`] hands out a request stamped with a
//! [`GenerationTicket`], the caller awaits [`GenerationRequest::run`] without holding the session,
//! and [`EditSession::finish_generation`] applies the result only if the inputs the ticket captured
//! are still current. Anything superseded becomes a no-op.

use std::time::Duration;

use crate::compare::renderer::{CompareRenderer, CompareState};
use crate::composite::feather::composite_with_ratio;
use crate::foundation::config::SessionOpts;
use crate::foundation::core::SelectionBox;
use crate::foundation::error::{PatchError, PatchResult};
use crate::generate::client::{GenerationClient, GenerationError, GenerationInput};
use crate::generate::retry::{RetryPolicy, generate_with_retry};
use crate::geometry::viewport::Viewport;
use crate::raster::bitmap::{Bitmap, ContentKey};
use crate::raster::cache::{DecodeCache, SourceKey};
use crate::raster::crop::extract;
use crate::select::selector::{GestureEvent, SelectionChange, SquareRules, SquareSelector};

/// Snapshot of the inputs a generation request was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTicket {
    request_id: u64,
    session_id: u64,
    reference: ContentKey,
    selection_rev: u64,
    selection: SelectionBox,
}

impl GenerationTicket {
    pub fn selection(&self) -> SelectionBox {
        self.selection
    }
}

/// Everything the external generation call needs, detached from the session.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub ticket: GenerationTicket,
    pub source_face: Bitmap,
    pub target_crop: Bitmap,
    pub prompt: String,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn input(&self) -> GenerationInput<'_> {
        GenerationInput {
            source_face: &self.source_face,
            target_crop: &self.target_crop,
            prompt: &self.prompt,
        }
    }

    /// Call the service with the session's retry policy and timeout.
    ///
    /// Borrows only the request, so the session keeps handling input while this is pending.
    pub async fn run<C: GenerationClient>(&self, client: &C) -> Result<Bitmap, GenerationError> {
        generate_with_retry(client, self.input(), &self.retry, self.timeout).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The patch was stored and the composite will be rebuilt.
    Applied,
    /// The session moved on while the call was in flight; the result was dropped.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CompositeKey {
    reference: ContentKey,
    patch: ContentKey,
    selection: SelectionBox,
}

#[derive(Clone, Debug, Default)]
enum CompositeSlot {
    #[default]
    Empty,
    Ready {
        key: CompositeKey,
        bitmap: Bitmap,
    },
    Failed {
        key: CompositeKey,
        message: String,
    },
}

pub struct EditSession {
    opts: SessionOpts,
    session_id: u64,
    reference: Option<Bitmap>,
    reference_source: Option<SourceKey>,
    source_face: Option<Bitmap>,
    face_source: Option<SourceKey>,
    patch: Option<Bitmap>,
    selector: SquareSelector,
    selection_rev: u64,
    next_request_id: u64,
    in_flight: Option<GenerationTicket>,
    composite: CompositeSlot,
    compare: CompareState,
    renderer: CompareRenderer,
    decode_cache: DecodeCache,
}

impl EditSession {
    pub fn new(opts: SessionOpts) -> PatchResult<Self> {
        opts.validate()?;
        let selector = SquareSelector::new(SquareRules {
            min_size: opts.min_selection_px,
        });
        let compare = CompareState::new(opts.default_split);
        Ok(Self {
            opts,
            session_id: 0,
            reference: None,
            reference_source: None,
            source_face: None,
            face_source: None,
            patch: None,
            selector,
            selection_rev: 0,
            next_request_id: 0,
            in_flight: None,
            composite: CompositeSlot::Empty,
            compare,
            renderer: CompareRenderer::new(),
            decode_cache: DecodeCache::new(),
        })
    }

    pub fn opts(&self) -> &SessionOpts {
        &self.opts
    }

    pub fn reference(&self) -> Option<&Bitmap> {
        self.reference.as_ref()
    }

    pub fn source_face(&self) -> Option<&Bitmap> {
        self.source_face.as_ref()
    }

    /// The raw generated patch. Kept even when compositing fails.
    pub fn patch(&self) -> Option<&Bitmap> {
        self.patch.as_ref()
    }

    pub fn selection(&self) -> Option<SelectionBox> {
        self.selector.selection()
    }

    /// Live preview while dragging, else the committed selection.
    pub fn visible_selection(&self) -> Option<SelectionBox> {
        self.selector.state().visible_box()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn can_generate(&self) -> bool {
        !self.is_generating()
            && self.reference.is_some()
            && self.source_face.is_some()
            && self.selection().is_some()
    }

    pub fn decode_cache(&self) -> &DecodeCache {
        &self.decode_cache
    }

    /// Decode and install a new reference photo. On failure the session is left untouched.
    ///
    /// The decoded entry of the photo it replaces is evicted from the decode cache.
    pub fn load_reference_bytes(&mut self, bytes: &[u8]) -> PatchResult<()> {
        let (key, bmp) = self.decode_cache.get_or_decode(bytes)?;
        self.install_reference(bmp, Some(key));
        Ok(())
    }

    /// Install a new reference photo, starting a fresh session identity.
    ///
    /// Drops the selection, patch and composite; any in-flight generation becomes stale.
    pub fn set_reference(&mut self, reference: Bitmap) {
        self.install_reference(reference, None);
    }

    fn install_reference(&mut self, reference: Bitmap, source: Option<SourceKey>) {
        let old = std::mem::replace(&mut self.reference_source, source);
        self.release_source(old);
        self.session_id += 1;
        tracing::info!(
            session = self.session_id,
            width = reference.width(),
            height = reference.height(),
            "reference image loaded"
        );
        self.reference = Some(reference);
        self.patch = None;
        self.selector.reset();
        self.selection_rev += 1;
        self.in_flight = None;
        self.composite = CompositeSlot::Empty;
        self.renderer.clear();
        self.compare = CompareState::new(self.opts.default_split);
    }

    pub fn load_source_face_bytes(&mut self, bytes: &[u8]) -> PatchResult<()> {
        let (key, bmp) = self.decode_cache.get_or_decode(bytes)?;
        self.install_source_face(bmp, Some(key));
        Ok(())
    }

    pub fn set_source_face(&mut self, face: Bitmap) {
        self.install_source_face(face, None);
    }

    fn install_source_face(&mut self, face: Bitmap, source: Option<SourceKey>) {
        let old = std::mem::replace(&mut self.face_source, source);
        self.release_source(old);
        tracing::info!(width = face.width(), height = face.height(), "source face loaded");
        self.source_face = Some(face);
    }

    /// Evict a decoded source that neither the reference nor the face still uses.
    fn release_source(&mut self, old: Option<SourceKey>) {
        let Some(key) = old else {
            return;
        };
        if self.reference_source == Some(key) || self.face_source == Some(key) {
            return;
        }
        if self.decode_cache.invalidate(key) {
            tracing::debug!(source = key.0, "evicted decoded source");
        }
    }

    /// Feed one pointer event on the selection surface.
    ///
    /// `viewport` must reflect the current layout of the reference image.
    pub fn pointer(
        &mut self,
        event: GestureEvent,
        viewport: &Viewport,
    ) -> PatchResult<Option<SelectionChange>> {
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| PatchError::validation("no reference image loaded"))?;
        if viewport.natural_size() != reference.dimensions() {
            return Err(PatchError::validation(format!(
                "viewport natural size {:?} does not match reference {:?}",
                viewport.natural_size(),
                reference.dimensions()
            )));
        }

        let before = self.selector.selection();
        let change = self.selector.handle(event, viewport);
        if self.selector.selection() != before {
            self.selection_rev += 1;
            self.compare = CompareState::new(self.opts.default_split);
        }
        Ok(change)
    }

    /// Forget the generated result and the selection that produced it.
    pub fn clear_result(&mut self) {
        self.patch = None;
        self.selector.reset();
        self.selection_rev += 1;
        self.in_flight = None;
        self.composite = CompositeSlot::Empty;
        self.renderer.set_composite(None);
        self.compare = CompareState::new(self.opts.default_split);
        tracing::debug!("generation result cleared");
    }

    /// Crop the committed selection and stamp a request for the generation call.
    ///
    /// Only one request may be outstanding per session identity.
    pub fn begin_generation(&mut self) -> PatchResult<GenerationRequest> {
        if self.in_flight.is_some() {
            return Err(PatchError::busy("a generation is already in flight"));
        }
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| PatchError::validation("no reference image loaded"))?;
        let source_face = self
            .source_face
            .clone()
            .ok_or_else(|| PatchError::validation("no source face loaded"))?;
        let selection = self
            .selector
            .selection()
            .ok_or_else(|| PatchError::validation("no committed selection"))?;
        selection.validate_square_within(reference.width(), reference.height())?;

        let target_crop = extract(reference, selection, self.opts.max_crop_dim)?;

        self.next_request_id += 1;
        let ticket = GenerationTicket {
            request_id: self.next_request_id,
            session_id: self.session_id,
            reference: reference.key(),
            selection_rev: self.selection_rev,
            selection,
        };
        self.in_flight = Some(ticket);
        tracing::info!(
            request = ticket.request_id,
            crop_w = target_crop.width(),
            crop_h = target_crop.height(),
            "generation requested"
        );

        Ok(GenerationRequest {
            ticket,
            source_face,
            target_crop,
            prompt: self.opts.prompt.clone(),
            retry: self.opts.retry.clone(),
            timeout: self.opts.generation_timeout(),
        })
    }

    fn is_current(&self, ticket: &GenerationTicket) -> bool {
        self.in_flight.as_ref() == Some(ticket)
            && ticket.session_id == self.session_id
            && ticket.selection_rev == self.selection_rev
            && self.reference.as_ref().map(Bitmap::key) == Some(ticket.reference)
    }

    /// Apply the result of a request from [`begin_generation`](Self::begin_generation).
    ///
    /// Stale results are dropped without touching state. A failure for a current request is
    /// returned as [`PatchError::Generation`] with the previous patch left in place.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<Bitmap, GenerationError>,
    ) -> PatchResult<GenerationOutcome> {
        if !self.is_current(&ticket) {
            if self.in_flight.as_ref() == Some(&ticket) {
                self.in_flight = None;
            }
            tracing::info!(request = ticket.request_id, "discarding stale generation result");
            return Ok(GenerationOutcome::Stale);
        }
        self.in_flight = None;

        let patch = result?;
        tracing::info!(
            request = ticket.request_id,
            width = patch.width(),
            height = patch.height(),
            "generation result applied"
        );
        self.patch = Some(patch);
        self.compare = CompareState::new(self.opts.default_split);
        Ok(GenerationOutcome::Applied)
    }

    /// Begin, run (with timeout and backoff) and finish one generation.
    ///
    /// Blocking convenience for scripts and tests: the session stays borrowed until the call
    /// completes, so nothing can supersede the request. Interactive callers use
    /// [`begin_generation`](Self::begin_generation), [`GenerationRequest::run`] and
    /// [`finish_generation`](Self::finish_generation) instead.
    pub async fn generate<C: GenerationClient>(
        &mut self,
        client: &C,
    ) -> PatchResult<GenerationOutcome> {
        let request = self.begin_generation()?;
        let result = request.run(client).await;
        self.finish_generation(request.ticket, result)
    }

    /// Current composite, rebuilt from scratch when reference, patch or selection changed.
    ///
    /// Building never touches the compare split; that is reset when the inputs change.
    ///
    /// `Ok(None)` while any input is missing. A compositing failure is remembered for the same
    /// inputs and reported as [`PatchError::Composite`]; the raw patch stays available.
    pub fn composite(&mut self) -> PatchResult<Option<Bitmap>> {
        let (Some(reference), Some(patch), Some(selection)) = (
            self.reference.as_ref(),
            self.patch.as_ref(),
            self.selector.selection(),
        ) else {
            return Ok(None);
        };
        let key = CompositeKey {
            reference: reference.key(),
            patch: patch.key(),
            selection,
        };

        match &self.composite {
            CompositeSlot::Ready { key: k, bitmap } if *k == key => return Ok(Some(bitmap.clone())),
            CompositeSlot::Failed { key: k, message } if *k == key => {
                return Err(PatchError::composite(message.clone()));
            }
            _ => {}
        }

        match composite_with_ratio(reference, patch, selection, self.opts.feather_ratio) {
            Ok(bitmap) => {
                tracing::debug!(?selection, "composite rebuilt");
                self.composite = CompositeSlot::Ready {
                    key,
                    bitmap: bitmap.clone(),
                };
                Ok(Some(bitmap))
            }
            Err(e) => {
                tracing::warn!(error = %e, "composite failed, keeping raw patch");
                let message = e.to_string();
                self.composite = CompositeSlot::Failed {
                    key,
                    message: message.clone(),
                };
                Err(PatchError::composite(message))
            }
        }
    }

    pub fn compare_state(&self) -> CompareState {
        self.compare
    }

    pub fn set_split(&mut self, split: f32) {
        self.compare.set_split(split);
    }

    /// Render the before/after view at the current split.
    pub fn render_compare(&mut self) -> PatchResult<Bitmap> {
        let reference = self
            .reference
            .clone()
            .ok_or_else(|| PatchError::validation("no reference image loaded"))?;
        let composite = self.composite()?;
        self.renderer.set_base(reference);
        self.renderer.set_composite(composite);
        self.renderer.render(self.compare.split())
    }

    /// Like [`render_compare`](Self::render_compare) but borrows the renderer's reused buffer.
    pub fn render_compare_into(&mut self) -> PatchResult<&[u8]> {
        let reference = self
            .reference
            .clone()
            .ok_or_else(|| PatchError::validation("no reference image loaded"))?;
        let composite = self.composite()?;
        self.renderer.set_base(reference);
        self.renderer.set_composite(composite);
        self.renderer.render_into(self.compare.split())
    }
}
