// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use texquad_math::Transform;
use texquad_render::{
    AcquireOutcome, FrameSettings, FrameStatus, PresentBackend, PresentOutcome, Presenter,
    RenderError, RenderSize, SwapchainLifecycle, SwapchainStage, WindowHost,
};

const WINDOW: RenderSize = RenderSize::new(800, 600);

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Create(SwapchainStage, RenderSize),
    Destroy(SwapchainStage),
    WaitIdle,
    WaitGate(usize),
    Acquire(usize),
    ResetGate(usize),
    Uniforms(usize),
    Submit(usize, u32),
    Present(usize, u32),
}

/// Fake GPU: submitted work only completes when the host blocks on it.
struct MockBackend {
    slots: usize,
    image_count: u32,
    next_image: u32,
    extent: RenderSize,

    live: HashSet<SwapchainStage>,
    gate_signaled: Vec<bool>,
    in_flight: VecDeque<usize>,

    calls: Vec<Call>,
    violations: Vec<String>,
    submissions: usize,
    swapchain_creations: usize,
    blocked_waits: usize,
    max_in_flight: usize,
    last_timeout: Option<Option<Duration>>,

    acquire_script: VecDeque<Result<AcquireOutcome, RenderError>>,
    present_script: VecDeque<PresentOutcome>,
    fail_stage: Option<SwapchainStage>,
    gate_times_out: bool,
}

impl MockBackend {
    fn new(slots: usize) -> Self {
        Self {
            slots,
            image_count: 3,
            next_image: 0,
            extent: RenderSize::default(),
            live: HashSet::new(),
            gate_signaled: vec![true; slots],
            in_flight: VecDeque::new(),
            calls: Vec::new(),
            violations: Vec::new(),
            submissions: 0,
            swapchain_creations: 0,
            blocked_waits: 0,
            max_in_flight: 0,
            last_timeout: None,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_stage: None,
            gate_times_out: false,
        }
    }

    fn require(&mut self, op: &str, stage: SwapchainStage) {
        if !self.live.contains(&stage) {
            self.violations
                .push(format!("{op} used {} after destroy", stage.name()));
        }
    }

    fn complete_oldest(&mut self) {
        if let Some(slot) = self.in_flight.pop_front() {
            self.gate_signaled[slot] = true;
        }
    }

    fn destroyed(&self) -> Vec<SwapchainStage> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Destroy(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn created(&self) -> Vec<SwapchainStage> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Create(s, _) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl PresentBackend for MockBackend {
    fn frame_slots(&self) -> usize {
        self.slots
    }

    fn extent(&self) -> RenderSize {
        self.extent
    }

    fn create_stage(&mut self, stage: SwapchainStage, size: RenderSize) -> Result<()> {
        self.calls.push(Call::Create(stage, size));
        if self.fail_stage == Some(stage) {
            return Err(anyhow!("{} rejected by driver", stage.name()));
        }
        for dep in stage.depends_on() {
            self.require("create", *dep);
        }
        if stage == SwapchainStage::Swapchain {
            self.swapchain_creations += 1;
            self.extent = size;
        }
        self.live.insert(stage);
        Ok(())
    }

    fn destroy_stage(&mut self, stage: SwapchainStage) {
        self.calls.push(Call::Destroy(stage));
        if !self.live.remove(&stage) {
            self.violations
                .push(format!("{} destroyed twice", stage.name()));
        }
        for other in &self.live {
            if other.depends_on().contains(&stage) {
                self.violations.push(format!(
                    "{} destroyed while {} still alive",
                    stage.name(),
                    other.name()
                ));
            }
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.calls.push(Call::WaitIdle);
        while !self.in_flight.is_empty() {
            self.complete_oldest();
        }
        Ok(())
    }

    fn wait_gate(&mut self, slot: usize, timeout: Option<Duration>) -> Result<()> {
        self.calls.push(Call::WaitGate(slot));
        self.last_timeout = Some(timeout);
        if self.gate_signaled[slot] {
            return Ok(());
        }
        if self.gate_times_out {
            return Err(RenderError::Timeout {
                what: "frame gate",
                timeout: timeout.unwrap_or(Duration::MAX),
            }
            .into());
        }
        self.blocked_waits += 1;
        while !self.gate_signaled[slot] {
            self.complete_oldest();
        }
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize, _timeout: Option<Duration>) -> Result<AcquireOutcome> {
        self.calls.push(Call::Acquire(slot));
        self.require("acquire", SwapchainStage::Swapchain);
        if let Some(scripted) = self.acquire_script.pop_front() {
            return Ok(scripted?);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal: false,
        })
    }

    fn reset_gate(&mut self, slot: usize) -> Result<()> {
        self.calls.push(Call::ResetGate(slot));
        if !self.gate_signaled[slot] {
            self.violations
                .push(format!("slot {slot} gate reset while still in flight"));
        }
        self.gate_signaled[slot] = false;
        Ok(())
    }

    fn update_uniforms(&mut self, slot: usize, _transform: &Transform) -> Result<()> {
        self.calls.push(Call::Uniforms(slot));
        Ok(())
    }

    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        self.calls.push(Call::Submit(slot, image_index));
        self.require("record", SwapchainStage::Framebuffers);
        self.require("record", SwapchainStage::Pipeline);
        if self.gate_signaled[slot] {
            self.violations
                .push(format!("slot {slot} submitted without resetting its gate"));
        }
        self.submissions += 1;
        self.in_flight.push_back(slot);
        self.max_in_flight = self.max_in_flight.max(self.in_flight.len());
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        self.calls.push(Call::Present(slot, image_index));
        self.require("present", SwapchainStage::Swapchain);
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Optimal))
    }
}

struct MockHost {
    size: RenderSize,
    upcoming: VecDeque<RenderSize>,
    waits: usize,
    close_after_waits: Option<usize>,
}

impl MockHost {
    fn new(size: RenderSize) -> Self {
        Self {
            size,
            upcoming: VecDeque::new(),
            waits: 0,
            close_after_waits: None,
        }
    }
}

impl WindowHost for MockHost {
    fn framebuffer_size(&self) -> RenderSize {
        self.size
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        if let Some(next) = self.upcoming.pop_front() {
            self.size = next;
        }
    }

    fn should_close(&self) -> bool {
        self.close_after_waits.is_some_and(|n| self.waits >= n)
    }
}

fn presenter(slots: usize, host: &mut MockHost) -> Presenter<MockBackend> {
    Presenter::new(MockBackend::new(slots), FrameSettings::default(), host).unwrap()
}

#[test]
fn initial_create_builds_every_stage_in_order() {
    let mut host = MockHost::new(WINDOW);
    let p = presenter(4, &mut host);

    assert_eq!(p.backend().created(), SwapchainStage::CREATION_ORDER);
    assert!(p.backend().violations.is_empty());
    assert_eq!(p.backend().extent, WINDOW);
}

#[test]
fn rebuild_destroys_in_reverse_creation_order() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);
    p.backend_mut().calls.clear();
    p.backend_mut()
        .present_script
        .push_back(PresentOutcome::OutOfDate);

    assert_eq!(
        p.draw_frame(&mut host).unwrap(),
        FrameStatus::PresentedThenRebuilt
    );

    let b = p.backend();
    assert_eq!(
        b.destroyed(),
        [
            SwapchainStage::Framebuffers,
            SwapchainStage::Pipeline,
            SwapchainStage::RenderPass,
            SwapchainStage::ImageViews,
            SwapchainStage::Swapchain,
        ]
    );
    assert_eq!(b.created(), SwapchainStage::CREATION_ORDER);

    let idle = b.calls.iter().position(|c| *c == Call::WaitIdle).unwrap();
    let first_destroy = b
        .calls
        .iter()
        .position(|c| matches!(c, Call::Destroy(_)))
        .unwrap();
    assert!(idle < first_destroy);
    assert!(b.violations.is_empty(), "{:?}", b.violations);
}

#[test]
fn mock_flags_out_of_order_teardown() {
    let mut backend = MockBackend::new(1);
    for stage in SwapchainStage::CREATION_ORDER {
        backend.create_stage(stage, WINDOW).unwrap();
    }
    backend.destroy_stage(SwapchainStage::Swapchain);
    backend.record_and_submit(0, 0).unwrap();

    assert!(backend
        .violations
        .iter()
        .any(|v| v.contains("swapchain destroyed while")));
    assert!(backend.violations.iter().any(|v| v.contains("reset")));
}

#[test]
fn failed_create_releases_what_was_built() {
    let mut backend = MockBackend::new(2);
    backend.fail_stage = Some(SwapchainStage::Pipeline);
    let mut lifecycle = SwapchainLifecycle::new();

    let err = lifecycle.create(&mut backend, WINDOW).unwrap_err();
    assert!(format!("{err:#}").contains("graphics pipeline"));
    assert!(!lifecycle.is_live());
    assert!(backend.live.is_empty());
    assert_eq!(
        backend.destroyed(),
        [
            SwapchainStage::RenderPass,
            SwapchainStage::ImageViews,
            SwapchainStage::Swapchain,
        ]
    );
    assert!(backend.violations.is_empty(), "{:?}", backend.violations);
}

#[test]
fn out_of_date_acquire_skips_submission_and_rebuilds_once() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);
    p.backend_mut()
        .acquire_script
        .push_back(Ok(AcquireOutcome::OutOfDate));

    assert_eq!(p.draw_frame(&mut host).unwrap(), FrameStatus::Skipped);

    let b = p.backend();
    assert_eq!(b.submissions, 0);
    assert_eq!(b.swapchain_creations, 2);
    assert_eq!(b.count(|c| matches!(c, Call::ResetGate(_))), 0);
    assert_eq!(b.count(|c| matches!(c, Call::Present(..))), 0);
    assert_eq!(p.rebuild_count(), 1);
    assert_eq!(p.current_slot(), 0);

    // next cycle reuses the same slot and goes through
    assert_eq!(p.draw_frame(&mut host).unwrap(), FrameStatus::Presented);
    assert_eq!(p.backend().submissions, 1);
    assert_eq!(p.current_slot(), 1);
}

#[test]
fn frame_past_slot_count_blocks_until_a_slot_frees() {
    const SLOTS: usize = 4;
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(SLOTS, &mut host);

    for _ in 0..SLOTS {
        assert_eq!(p.draw_frame(&mut host).unwrap(), FrameStatus::Presented);
    }
    assert_eq!(p.backend().blocked_waits, 0);
    assert_eq!(p.backend().in_flight.len(), SLOTS);

    p.draw_frame(&mut host).unwrap();
    let b = p.backend();
    assert_eq!(b.blocked_waits, 1);
    assert_eq!(b.max_in_flight, SLOTS);
    assert!(b.violations.is_empty(), "{:?}", b.violations);
}

#[test]
fn long_run_never_exceeds_slot_count() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(2, &mut host);
    for _ in 0..25 {
        p.draw_frame(&mut host).unwrap();
    }
    assert_eq!(p.backend().max_in_flight, 2);
    assert_eq!(p.backend().submissions, 25);
    assert!(p.backend().violations.is_empty());
}

#[test]
fn suboptimal_acquire_presents_then_rebuilds() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);
    p.backend_mut()
        .acquire_script
        .push_back(Ok(AcquireOutcome::Ready {
            image_index: 2,
            suboptimal: true,
        }));

    assert_eq!(
        p.draw_frame(&mut host).unwrap(),
        FrameStatus::PresentedThenRebuilt
    );

    let b = p.backend();
    assert_eq!(b.submissions, 1);
    assert!(b.calls.contains(&Call::Present(0, 2)));
    let present = b.calls.iter().position(|c| *c == Call::Present(0, 2)).unwrap();
    let rebuild = b.calls.iter().position(|c| *c == Call::WaitIdle).unwrap();
    assert!(present < rebuild);
    assert_eq!(p.rebuild_count(), 1);
    assert_eq!(p.current_slot(), 1);
}

#[test]
fn present_out_of_date_or_suboptimal_rebuilds() {
    for outcome in [PresentOutcome::OutOfDate, PresentOutcome::Suboptimal] {
        let mut host = MockHost::new(WINDOW);
        let mut p = presenter(4, &mut host);
        p.backend_mut().present_script.push_back(outcome);

        assert_eq!(
            p.draw_frame(&mut host).unwrap(),
            FrameStatus::PresentedThenRebuilt,
            "{outcome:?}"
        );
        assert_eq!(p.rebuild_count(), 1);
        assert_eq!(p.backend().submissions, 1);
    }
}

#[test]
fn resize_notification_rebuilds_once_and_clears() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);
    let notifier = p.resize_notifier();

    notifier.notify();
    host.size = RenderSize::new(1280, 720);
    assert_eq!(
        p.draw_frame(&mut host).unwrap(),
        FrameStatus::PresentedThenRebuilt
    );
    assert_eq!(p.backend().extent, RenderSize::new(1280, 720));

    assert_eq!(p.draw_frame(&mut host).unwrap(), FrameStatus::Presented);
    assert_eq!(p.rebuild_count(), 1);
}

#[test]
fn minimized_rebuild_waits_on_events_for_nonzero_size() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);

    host.size = RenderSize::new(0, 0);
    host.upcoming = VecDeque::from([RenderSize::new(640, 0), RenderSize::new(1024, 768)]);
    p.backend_mut()
        .present_script
        .push_back(PresentOutcome::OutOfDate);

    assert_eq!(
        p.draw_frame(&mut host).unwrap(),
        FrameStatus::PresentedThenRebuilt
    );
    assert_eq!(host.waits, 2);
    assert!(p
        .backend()
        .calls
        .contains(&Call::Create(SwapchainStage::Swapchain, RenderSize::new(1024, 768))));
}

#[test]
fn closing_while_minimized_abandons_rebuild() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);

    host.size = RenderSize::new(0, 0);
    host.close_after_waits = Some(1);
    p.backend_mut()
        .acquire_script
        .push_back(Ok(AcquireOutcome::OutOfDate));

    assert_eq!(p.draw_frame(&mut host).unwrap(), FrameStatus::HostClosing);
    assert_eq!(p.backend().swapchain_creations, 1);
    assert_eq!(p.rebuild_count(), 0);
    assert_eq!(p.backend().count(|c| matches!(c, Call::Destroy(_))), 0);
}

#[test]
fn unrecoverable_acquire_is_fatal() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);
    p.backend_mut()
        .acquire_script
        .push_back(Err(RenderError::Acquire("ERROR_DEVICE_LOST".into())));

    let err = p.draw_frame(&mut host).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RenderError>(),
        Some(RenderError::Acquire(_))
    ));
    assert_eq!(p.backend().submissions, 0);
    assert_eq!(p.rebuild_count(), 0);
}

#[test]
fn finite_timeout_is_forwarded_and_reported() {
    let mut host = MockHost::new(WINDOW);
    let settings = FrameSettings {
        gate_timeout: Some(Duration::from_millis(16)),
    };
    let mut p = Presenter::new(MockBackend::new(1), settings, &mut host).unwrap();

    p.draw_frame(&mut host).unwrap();
    assert_eq!(
        p.backend().last_timeout,
        Some(Some(Duration::from_millis(16)))
    );

    p.backend_mut().gate_times_out = true;
    let err = p.draw_frame(&mut host).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RenderError>(),
        Some(RenderError::Timeout { .. })
    ));
}

#[test]
fn shutdown_idles_then_releases_everything() {
    let mut host = MockHost::new(WINDOW);
    let mut p = presenter(4, &mut host);
    p.draw_frame(&mut host).unwrap();
    p.backend_mut().calls.clear();

    p.shutdown().unwrap();

    let b = p.backend();
    assert_eq!(b.calls.first(), Some(&Call::WaitIdle));
    assert!(b.live.is_empty());
    assert_eq!(b.destroyed().len(), 5);
    assert!(b.violations.is_empty());
}

#[test]
fn closed_before_drawable_is_an_error() {
    let mut host = MockHost::new(RenderSize::new(0, 0));
    host.close_after_waits = Some(0);
    assert!(Presenter::new(MockBackend::new(1), FrameSettings::default(), &mut host).is_err());
}
