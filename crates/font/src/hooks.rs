//! Host hooks invoked while decoding and rasterizing.
//!
//! Neither hook affects results. The trace sink receives human-readable
//! progress lines; the reclaim hook gives a memory-constrained host a chance
//! to free transient buffers during long array decodes.

use core::fmt;

/// Elements decoded between two reclaim-hook invocations by default.
pub const DEFAULT_RECLAIM_EVERY: usize = 2500;

// ─────────────────────────────────────────────────────────────────────────────
// Tracer
// ─────────────────────────────────────────────────────────────────────────────

/// Optional sink for debug/progress strings.
///
/// Every message is also forwarded to `log::trace!`.
#[derive(Clone, Copy, Default)]
pub struct Tracer<'a> {
    sink: Option<&'a dyn Fn(&str)>,
}

impl<'a> Tracer<'a> {
    /// A tracer that only forwards to the `log` facade.
    pub const fn none() -> Self {
        Self { sink: None }
    }

    pub fn new(sink: &'a dyn Fn(&str)) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn emit(&self, args: fmt::Arguments<'_>) {
        log::trace!("{args}");
        if let Some(sink) = self.sink {
            sink(&args.to_string());
        }
    }
}

impl fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reclaimer
// ─────────────────────────────────────────────────────────────────────────────

/// Rate-limited wrapper around the host's memory-reclamation hook.
pub struct Reclaimer<'a> {
    hook: Option<Box<dyn FnMut() + 'a>>,
    every: usize,
    seen: usize,
    calls: usize,
}

impl<'a> Reclaimer<'a> {
    pub fn new(hook: impl FnMut() + 'a, every: usize) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            every: every.max(1),
            seen: 0,
            calls: 0,
        }
    }

    /// Record one decoded element, invoking the hook every `every` elements.
    #[inline]
    pub fn tick(&mut self) {
        self.seen += 1;
        if self.seen % self.every == 0 {
            if let Some(hook) = self.hook.as_mut() {
                hook();
                self.calls += 1;
            }
        }
    }

    /// Number of times the hook has run.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for Reclaimer<'_> {
    fn default() -> Self {
        Self {
            hook: None,
            every: DEFAULT_RECLAIM_EVERY,
            seen: 0,
            calls: 0,
        }
    }
}

impl fmt::Debug for Reclaimer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reclaimer")
            .field("hook", &self.hook.is_some())
            .field("every", &self.every)
            .field("seen", &self.seen)
            .field("calls", &self.calls)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LoadOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Hooks passed to [`Font::load_with`](crate::face::Font::load_with).
#[derive(Debug, Default)]
pub struct LoadOptions<'a> {
    pub(crate) reclaimer: Reclaimer<'a>,
    pub(crate) tracer: Tracer<'a>,
}

impl<'a> LoadOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a reclamation hook, keeping the current cadence.
    pub fn reclaim_hook(mut self, hook: impl FnMut() + 'a) -> Self {
        let every = self.reclaimer.every;
        self.reclaimer = Reclaimer::new(hook, every);
        self
    }

    /// Set how many decoded elements pass between hook invocations.
    pub fn reclaim_every(mut self, every: usize) -> Self {
        self.reclaimer.every = every.max(1);
        self
    }

    pub fn trace(mut self, sink: &'a dyn Fn(&str)) -> Self {
        self.tracer = Tracer::new(sink);
        self
    }
}
