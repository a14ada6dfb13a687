//! Event bridge - turns host notifications into signal generations
//!
//! Hosts publish [`HostEvent`]s on a channel. The bridge drains it and bumps
//! one counter per [`SignalClass`] seen in a drained batch; the retry gate
//! only ever reads those counters. Bursts are coalesced, but a batch that
//! contains a class always advances that class.

use declarative::ResourceKind;
use hostkit::{EventSink, HostEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Category of host notification relevant to retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalClass {
    BundleLifecycle,
    FrameworkRefresh,
    ConfigAdminAvailability,
}

impl SignalClass {
    pub const ALL: [SignalClass; 3] = [
        SignalClass::BundleLifecycle,
        SignalClass::FrameworkRefresh,
        SignalClass::ConfigAdminAvailability,
    ];

    /// Class a notification belongs to
    pub fn of(event: &HostEvent) -> Self {
        match event {
            HostEvent::Bundle { .. } => Self::BundleLifecycle,
            HostEvent::FrameworkRefreshed => Self::FrameworkRefresh,
            HostEvent::ConfigStore { .. } => Self::ConfigAdminAvailability,
        }
    }

    /// Classes whose signals make a retry of `kind` worthwhile
    pub fn gating(kind: ResourceKind) -> &'static [SignalClass] {
        match kind {
            ResourceKind::Bundle => &[Self::BundleLifecycle, Self::FrameworkRefresh],
            ResourceKind::Configuration => &[Self::ConfigAdminAvailability],
        }
    }

    fn index(self) -> usize {
        match self {
            Self::BundleLifecycle => 0,
            Self::FrameworkRefresh => 1,
            Self::ConfigAdminAvailability => 2,
        }
    }
}

/// Monotonic counters, one per signal class
#[derive(Debug, Default)]
pub struct SignalGenerations {
    counters: [AtomicU64; 3],
}

impl SignalGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, class: SignalClass) -> u64 {
        self.counters[class.index()].load(Ordering::SeqCst)
    }

    /// Combined generation over the classes gating `kind`
    ///
    /// The sum only grows, and grows whenever any gating class advances.
    pub fn current_for(&self, kind: ResourceKind) -> u64 {
        SignalClass::gating(kind)
            .iter()
            .map(|class| self.current(*class))
            .sum()
    }

    pub fn bump(&self, class: SignalClass) -> u64 {
        self.counters[class.index()].fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Bump each class present in `events` once; returns how many events there were
    pub fn apply_batch(&self, events: impl IntoIterator<Item = HostEvent>) -> usize {
        let mut seen = [false; 3];
        let mut count = 0;
        for event in events {
            seen[SignalClass::of(&event).index()] = true;
            count += 1;
        }
        for class in SignalClass::ALL {
            if seen[class.index()] {
                let generation = self.bump(class);
                log::debug!("Signal {class:?} advanced to generation {generation}");
            }
        }
        count
    }
}

/// Owner of the inbound notification channel
#[derive(Debug)]
pub struct EventBridge {
    receiver: Mutex<Option<Receiver<HostEvent>>>,
    generations: Arc<SignalGenerations>,
}

impl EventBridge {
    /// Create a bridge and the sink hosts publish on
    pub fn channel() -> (EventSink, Self) {
        let (sender, receiver) = mpsc::channel();
        let bridge = Self {
            receiver: Mutex::new(Some(receiver)),
            generations: Arc::new(SignalGenerations::new()),
        };
        (sender, bridge)
    }

    /// Shared, read-only view of the counters
    pub fn generations(&self) -> &Arc<SignalGenerations> {
        &self.generations
    }

    pub fn current_generation(&self, class: SignalClass) -> u64 {
        self.generations.current(class)
    }

    /// Drain queued notifications without blocking
    ///
    /// Does nothing once a listener thread owns the receiver.
    pub fn pump(&self) -> usize {
        let guard = crate::lock(&self.receiver);
        match guard.as_ref() {
            Some(receiver) => self.generations.apply_batch(receiver.try_iter()),
            None => 0,
        }
    }

    /// Move the receiver to a background thread that applies notifications
    /// as they arrive
    ///
    /// Returns `None` if a listener is already running. The thread exits
    /// once every sink has been dropped.
    pub fn spawn_listener(&self) -> Option<JoinHandle<()>> {
        let receiver = crate::lock(&self.receiver).take()?;
        let generations = Arc::clone(&self.generations);
        Some(std::thread::spawn(move || {
            while let Ok(first) = receiver.recv() {
                let batch = std::iter::once(first).chain(receiver.try_iter());
                generations.apply_batch(batch);
            }
            log::debug!("All event sinks dropped, listener exiting");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostkit::BundleEventKind;
    use std::time::{Duration, Instant};

    fn bundle_event(kind: BundleEventKind) -> HostEvent {
        HostEvent::Bundle {
            location: "a.jar".to_string(),
            kind,
        }
    }

    #[test]
    fn test_signal_class_of() {
        assert_eq!(
            SignalClass::of(&bundle_event(BundleEventKind::Started)),
            SignalClass::BundleLifecycle
        );
        assert_eq!(
            SignalClass::of(&HostEvent::FrameworkRefreshed),
            SignalClass::FrameworkRefresh
        );
        assert_eq!(
            SignalClass::of(&HostEvent::ConfigStore { available: true }),
            SignalClass::ConfigAdminAvailability
        );
    }

    #[test]
    fn test_pump_coalesces_batch() {
        let (sink, bridge) = EventBridge::channel();
        sink.send(bundle_event(BundleEventKind::Installed)).unwrap();
        sink.send(bundle_event(BundleEventKind::Started)).unwrap();
        sink.send(HostEvent::FrameworkRefreshed).unwrap();

        assert_eq!(bridge.pump(), 3);
        assert_eq!(bridge.current_generation(SignalClass::BundleLifecycle), 1);
        assert_eq!(bridge.current_generation(SignalClass::FrameworkRefresh), 1);
        assert_eq!(
            bridge.current_generation(SignalClass::ConfigAdminAvailability),
            0
        );
    }

    #[test]
    fn test_pump_empty_channel() {
        let (_sink, bridge) = EventBridge::channel();
        assert_eq!(bridge.pump(), 0);
        assert_eq!(bridge.current_generation(SignalClass::BundleLifecycle), 0);
    }

    #[test]
    fn test_current_for_kind() {
        let generations = SignalGenerations::new();
        generations.bump(SignalClass::BundleLifecycle);
        generations.bump(SignalClass::FrameworkRefresh);
        generations.bump(SignalClass::FrameworkRefresh);
        assert_eq!(generations.current_for(ResourceKind::Bundle), 3);
        assert_eq!(generations.current_for(ResourceKind::Configuration), 0);

        generations.bump(SignalClass::ConfigAdminAvailability);
        assert_eq!(generations.current_for(ResourceKind::Configuration), 1);
        assert_eq!(generations.current_for(ResourceKind::Bundle), 3);
    }

    #[test]
    fn test_listener_thread_applies_events() {
        let (sink, bridge) = EventBridge::channel();
        let handle = bridge.spawn_listener().unwrap();
        assert!(bridge.spawn_listener().is_none());

        sink.send(HostEvent::ConfigStore { available: true }).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while bridge.current_generation(SignalClass::ConfigAdminAvailability) == 0 {
            assert!(Instant::now() < deadline, "listener never applied the event");
            std::thread::sleep(Duration::from_millis(5));
        }
        // Pumping is a no-op once the listener owns the receiver
        assert_eq!(bridge.pump(), 0);

        drop(sink);
        handle.join().unwrap();
    }
}
