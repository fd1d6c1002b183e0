//! Render target lifecycle
//!
//! [`FramebufferManager`] owns the depth buffer of the visible (surface)
//! target and an optional multisampled colour+depth target. Multisampling
//! is probed at initialization: the requested sample count is halved until
//! the driver both reports support for it and actually manages to allocate
//! it. A count of one means there is no MSAA target at all.
//!
//! Allocation goes through the [`TargetAllocator`] seam so the lifecycle
//! can run without a GPU.

use log::{debug, error, info, warn};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FramebufferError {
    #[error("render target has zero size")]
    ZeroSize,
    #[error("{0}x multisampling is not supported")]
    UnsupportedSampleCount(u32),
    #[error("out of GPU memory while allocating a render target")]
    OutOfMemory,
    #[error("render target allocation rejected: {0}")]
    Validation(String),
    #[error("framebuffers are not initialized")]
    NotInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Initialized,
    ErrorDuringInitialization,
    Suspended,
}

/// Which target a frame renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTarget {
    /// Multisampled target, resolved into the surface at the end of the pass
    Msaa,
    /// Surface texture with the visible depth buffer
    Visible,
}

/// Allocates GPU render targets
pub trait TargetAllocator {
    type Color;
    type Depth;

    /// Whether the device claims to support `samples` for both colour and
    /// depth targets
    fn supports_sample_count(&self, samples: u32) -> bool;

    fn create_color(&self, size: TargetSize, samples: u32) -> Result<Self::Color, FramebufferError>;

    fn create_depth(&self, size: TargetSize, samples: u32) -> Result<Self::Depth, FramebufferError>;
}

pub struct MsaaTarget<C, D> {
    pub color: C,
    pub depth: D,
    pub samples: u32,
}

pub struct FramebufferManager<A: TargetAllocator> {
    allocator: A,
    requested_samples: u32,
    /// Highest sample count worth probing on the next reallocation
    sample_ceiling: u32,
    state: SurfaceState,
    size: Option<TargetSize>,
    visible_depth: Option<A::Depth>,
    msaa: Option<MsaaTarget<A::Color, A::Depth>>,
}

impl<A: TargetAllocator> FramebufferManager<A> {
    pub fn new(allocator: A, requested_samples: u32) -> Self {
        Self {
            allocator,
            requested_samples,
            sample_ceiling: requested_samples,
            state: SurfaceState::Uninitialized,
            size: None,
            visible_depth: None,
            msaa: None,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn size(&self) -> Option<TargetSize> {
        self.size
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Sample count of the MSAA target, or 1 when there is none
    pub fn msaa_samples(&self) -> u32 {
        self.msaa.as_ref().map_or(1, |m| m.samples)
    }

    pub fn visible_depth(&self) -> Option<&A::Depth> {
        self.visible_depth.as_ref()
    }

    pub fn msaa_target(&self) -> Option<&MsaaTarget<A::Color, A::Depth>> {
        self.msaa.as_ref()
    }

    /// Allocates targets for `size`. Does nothing unless the manager is
    /// uninitialized, so it is safe to call at the top of every frame.
    pub fn initialize(&mut self, size: TargetSize) -> Result<SurfaceState, FramebufferError> {
        match self.state {
            SurfaceState::Uninitialized => {}
            SurfaceState::Initialized | SurfaceState::ErrorDuringInitialization => {
                return Ok(self.state)
            }
            SurfaceState::Suspended => return Err(FramebufferError::NotInitialized),
        }
        if size.is_empty() {
            return Err(FramebufferError::ZeroSize);
        }

        self.sample_ceiling = self.requested_samples;
        self.allocate(size)?;
        self.state = SurfaceState::Initialized;
        info!(
            "Framebuffers initialized at {}x{} with {}",
            size.width,
            size.height,
            describe_samples(self.msaa_samples())
        );
        Ok(self.state)
    }

    /// Reallocates for a new surface size. Zero and unchanged sizes are
    /// ignored; before initialization only the size is remembered.
    pub fn resize(&mut self, size: TargetSize) -> Result<(), FramebufferError> {
        if size.is_empty() || self.size == Some(size) {
            return Ok(());
        }
        if self.state != SurfaceState::Initialized {
            self.size = Some(size);
            return Ok(());
        }

        debug!("Resizing framebuffers to {}x{}", size.width, size.height);
        self.visible_depth = None;
        self.msaa = None;
        self.allocate(size)
    }

    /// Releases every target. The next [`initialize`](Self::initialize)
    /// starts from scratch, including the MSAA probe.
    pub fn destroy(&mut self) {
        if self.visible_depth.is_some() || self.msaa.is_some() {
            debug!("Destroying framebuffers");
        }
        self.visible_depth = None;
        self.msaa = None;
        self.state = SurfaceState::Uninitialized;
    }

    /// Releases every target while the surface is gone
    pub fn suspend(&mut self) {
        self.destroy();
        self.state = SurfaceState::Suspended;
        info!("Framebuffers suspended");
    }

    pub fn resume(&mut self, size: TargetSize) -> Result<SurfaceState, FramebufferError> {
        if self.state == SurfaceState::Suspended {
            self.state = SurfaceState::Uninitialized;
        }
        self.initialize(size)
    }

    /// Leaves the error state so the next frame tries to initialize again
    pub fn retry(&mut self) {
        if self.state == SurfaceState::ErrorDuringInitialization {
            self.state = SurfaceState::Uninitialized;
        }
    }

    /// Picks the target for this frame. Fast drawing (interaction in
    /// progress) skips multisampling. `None` until initialized.
    pub fn select(&self, fast_drawing: bool) -> Option<ActiveTarget> {
        if self.state != SurfaceState::Initialized {
            return None;
        }
        if fast_drawing || self.msaa.is_none() {
            Some(ActiveTarget::Visible)
        } else {
            Some(ActiveTarget::Msaa)
        }
    }

    fn allocate(&mut self, size: TargetSize) -> Result<(), FramebufferError> {
        self.size = Some(size);

        // The visible target always needs depth: fast drawing renders into
        // it directly even when an MSAA target exists.
        match self.allocator.create_depth(size, 1) {
            Ok(depth) => self.visible_depth = Some(depth),
            Err(err) => {
                error!("Failed to create visible depth buffer: {}", err);
                self.msaa = None;
                self.state = SurfaceState::ErrorDuringInitialization;
                return Err(err);
            }
        }

        self.msaa = self.probe_msaa(size);
        self.sample_ceiling = self.msaa_samples();
        Ok(())
    }

    fn probe_msaa(&self, size: TargetSize) -> Option<MsaaTarget<A::Color, A::Depth>> {
        let mut samples = largest_power_of_two(self.sample_ceiling);

        while samples > 1 {
            if !self.allocator.supports_sample_count(samples) {
                debug!("{}x multisampling not supported, trying lower", samples);
                samples /= 2;
                continue;
            }

            let target = self
                .allocator
                .create_color(size, samples)
                .and_then(|color| {
                    let depth = self.allocator.create_depth(size, samples)?;
                    Ok(MsaaTarget {
                        color,
                        depth,
                        samples,
                    })
                });

            match target {
                Ok(target) => return Some(target),
                Err(err) => {
                    warn!("{}x multisample target failed ({}), trying lower", samples, err);
                    samples /= 2;
                }
            }
        }

        if self.requested_samples > 1 {
            warn!("Multisampling unavailable, rendering without anti-aliasing");
        }
        None
    }
}

fn largest_power_of_two(n: u32) -> u32 {
    if n == 0 {
        0
    } else {
        1 << (31 - n.leading_zeros())
    }
}

fn describe_samples(samples: u32) -> String {
    if samples > 1 {
        format!("{}x MSAA", samples)
    } else {
        "no MSAA".to_owned()
    }
}
