use std::cell::Cell;
use std::time::Duration;

use facepatch::{
    Bitmap, EditSession, GenerationClient, GenerationError, GenerationInput, GenerationOutcome,
    GestureEvent, PatchError, Point, SelectionBox, SessionOpts, Viewport, generate_with_retry,
};

struct Echo {
    color: [u8; 4],
    delay: Duration,
    calls: Cell<u32>,
}

impl Echo {
    fn new(color: [u8; 4], delay: Duration) -> Self {
        Self {
            color,
            delay,
            calls: Cell::new(0),
        }
    }
}

impl GenerationClient for Echo {
    async fn generate(&self, input: GenerationInput<'_>) -> Result<Bitmap, GenerationError> {
        self.calls.set(self.calls.get() + 1);
        tokio::time::sleep(self.delay).await;
        let (w, h) = input.target_crop.dimensions();
        Bitmap::solid(w, h, self.color).map_err(|_| GenerationError::NoImageReturned {
            detail: String::new(),
        })
    }
}

struct Failing;

impl GenerationClient for Failing {
    async fn generate(&self, _input: GenerationInput<'_>) -> Result<Bitmap, GenerationError> {
        Err(GenerationError::MissingCredential)
    }
}

fn ready_session(width: u32, height: u32) -> (EditSession, Viewport) {
    let mut s = EditSession::new(SessionOpts::default()).unwrap();
    s.set_reference(Bitmap::solid(width, height, [0, 0, 255, 255]).unwrap());
    s.set_source_face(Bitmap::solid(48, 48, [200, 160, 130, 255]).unwrap());
    let vp = Viewport::identity(width, height).unwrap();
    s.pointer(GestureEvent::Start(Point::new(20.0, 20.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::Move(Point::new(120.0, 120.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::End, &vp).unwrap();
    (s, vp)
}

#[tokio::test(start_paused = true)]
async fn generate_applies_current_result() {
    let (mut s, _) = ready_session(300, 200);
    let client = Echo::new([255, 0, 0, 255], Duration::from_secs(5));

    assert_eq!(s.generate(&client).await.unwrap(), GenerationOutcome::Applied);
    assert_eq!(client.calls.get(), 1);
    assert_eq!(s.patch().unwrap().dimensions(), (100, 100));
    assert!(!s.is_generating());

    let comp = s.composite().unwrap().unwrap();
    assert_eq!(comp.pixel(70, 70), [255, 0, 0, 255]);
    assert_eq!(comp.pixel(200, 150), [0, 0, 255, 255]);
}

#[tokio::test(start_paused = true)]
async fn result_for_replaced_reference_is_dropped() {
    let (mut s, _) = ready_session(300, 200);
    let client = Echo::new([255, 0, 0, 255], Duration::from_secs(30));

    let policy = s.opts().retry.clone();
    let timeout = s.opts().generation_timeout();
    let req = s.begin_generation().unwrap();
    let pending = generate_with_retry(&client, req.input(), &policy, timeout);

    // A new photo arrives while the call is outstanding.
    let replacement = Bitmap::solid(300, 200, [0, 255, 0, 255]).unwrap();
    s.set_reference(replacement.clone());
    assert!(!s.is_generating());

    let result = pending.await;
    assert!(result.is_ok());
    assert_eq!(
        s.finish_generation(req.ticket, result).unwrap(),
        GenerationOutcome::Stale
    );
    assert!(s.patch().is_none());
    assert!(s.selection().is_none());
    assert!(s.composite().unwrap().is_none());
    assert_eq!(s.render_compare().unwrap(), replacement);
}

#[tokio::test(start_paused = true)]
async fn result_for_reselected_region_is_dropped() {
    let (mut s, vp) = ready_session(300, 200);
    let client = Echo::new([255, 0, 0, 255], Duration::from_secs(1));

    let policy = s.opts().retry.clone();
    let timeout = s.opts().generation_timeout();
    let req = s.begin_generation().unwrap();
    let pending = generate_with_retry(&client, req.input(), &policy, timeout);

    s.pointer(GestureEvent::Start(Point::new(150.0, 50.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::Move(Point::new(250.0, 150.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::End, &vp).unwrap();
    assert_eq!(s.selection(), Some(SelectionBox::square(150, 50, 100)));

    let result = pending.await;
    assert_eq!(
        s.finish_generation(req.ticket, result).unwrap(),
        GenerationOutcome::Stale
    );
    assert!(s.patch().is_none());
    assert!(s.can_generate());
}

#[tokio::test(start_paused = true)]
async fn stale_result_does_not_overwrite_newer_composite() {
    let (mut s, vp) = ready_session(300, 200);
    let slow = Echo::new([255, 0, 0, 255], Duration::from_secs(60));

    let policy = s.opts().retry.clone();
    let timeout = s.opts().generation_timeout();
    let old = s.begin_generation().unwrap();
    let pending = generate_with_retry(&slow, old.input(), &policy, timeout);

    s.set_reference(Bitmap::solid(300, 200, [0, 0, 255, 255]).unwrap());
    s.pointer(GestureEvent::Start(Point::new(150.0, 50.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::Move(Point::new(250.0, 150.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::End, &vp).unwrap();

    let fast = Echo::new([0, 255, 0, 255], Duration::from_secs(1));
    assert_eq!(s.generate(&fast).await.unwrap(), GenerationOutcome::Applied);
    let newer = s.composite().unwrap().unwrap();
    assert_eq!(newer.pixel(200, 100), [0, 255, 0, 255]);

    let old_result = pending.await;
    assert_eq!(
        s.finish_generation(old.ticket, old_result).unwrap(),
        GenerationOutcome::Stale
    );
    assert_eq!(s.composite().unwrap().unwrap(), newer);
    assert_eq!(s.patch().unwrap().pixel(0, 0), [0, 255, 0, 255]);
}

#[tokio::test(start_paused = true)]
async fn second_request_while_in_flight_is_busy() {
    let (mut s, _) = ready_session(300, 200);
    let _req = s.begin_generation().unwrap();
    let client = Echo::new([1, 1, 1, 255], Duration::ZERO);
    let err = s.generate(&client).await.unwrap_err();
    assert!(matches!(err, PatchError::Busy(_)));
    assert_eq!(client.calls.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn generation_failure_surfaces_and_unblocks() {
    let (mut s, _) = ready_session(300, 200);
    let err = s.generate(&Failing).await.unwrap_err();
    assert!(matches!(
        err,
        PatchError::Generation(GenerationError::MissingCredential)
    ));
    assert!(!s.is_generating());
    assert!(s.can_generate());
    assert!(s.patch().is_none());
}

#[tokio::test(start_paused = true)]
async fn session_accepts_input_while_request_runs() {
    let (mut s, vp) = ready_session(300, 200);
    let client = Echo::new([255, 0, 0, 255], Duration::from_secs(20));

    let req = s.begin_generation().unwrap();
    assert_eq!(req.timeout, s.opts().generation_timeout());
    let pending = req.run(&client);

    s.pointer(GestureEvent::Start(Point::new(30.0, 40.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::Move(Point::new(140.0, 150.0)), &vp)
        .unwrap();
    s.pointer(GestureEvent::End, &vp).unwrap();

    let result = pending.await;
    assert_eq!(client.calls.get(), 1);
    assert_eq!(
        s.finish_generation(req.ticket, result).unwrap(),
        GenerationOutcome::Stale
    );
    assert_eq!(s.selection(), Some(SelectionBox::square(30, 40, 110)));
    assert!(s.patch().is_none());
}
