//! Zero-copy presentation: the shared display surface and the one-shot
//! negotiation that decides whether the GPU engine may use it.
//!
//! The negotiator is a three-state machine:
//!
//! ```text
//! Unprobed --probe ok--> ZeroCopyActive --first failure--> BufferCopyActive
//!     \---------------probe failed / disabled-------------------^
//! ```
//!
//! `BufferCopyActive` is terminal for the session.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Texel format of the shared surface: one `(U, V)` pair per texel.
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Float;

/// Bytes per texel of [`SURFACE_FORMAT`].
pub const SURFACE_TEXEL_BYTES: u32 = 8;

/// Negotiation state for the GPU engine's presentation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteropState {
    Unprobed,
    ZeroCopyActive,
    BufferCopyActive,
}

/// Reasons the zero-copy path is unavailable or was abandoned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InteropFailure {
    #[error("zero-copy presentation disabled by configuration")]
    Disabled,
    #[error("row pitch of {bytes_per_row} bytes is not a multiple of {alignment}")]
    RowPitch { bytes_per_row: u32, alignment: u32 },
    #[error("grid {width}x{height} exceeds the maximum texture dimension {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
    #[error("shared surface could not be acquired: held by {0}")]
    Acquire(SurfaceOwner),
    #[error("shared surface could not be released: held by {0}")]
    Release(SurfaceOwner),
}

/// One-shot capability probe with permanent demotion.
#[derive(Debug)]
pub struct InteropNegotiator {
    state: InteropState,
    failure: Option<InteropFailure>,
}

impl Default for InteropNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl InteropNegotiator {
    pub fn new() -> Self {
        Self {
            state: InteropState::Unprobed,
            failure: None,
        }
    }

    #[inline]
    pub fn state(&self) -> InteropState {
        self.state
    }

    #[inline]
    pub fn is_zero_copy(&self) -> bool {
        self.state == InteropState::ZeroCopyActive
    }

    /// The failure that ended (or prevented) zero-copy mode, if any.
    pub fn failure(&self) -> Option<&InteropFailure> {
        self.failure.as_ref()
    }

    /// Run `attempt` once to set up zero-copy resources.
    ///
    /// Only the first call in the `Unprobed` state runs `attempt`; later calls
    /// return `None` without probing again.
    pub fn probe<T>(
        &mut self,
        attempt: impl FnOnce() -> Result<T, InteropFailure>,
    ) -> Option<T> {
        if self.state != InteropState::Unprobed {
            return None;
        }

        match attempt() {
            Ok(resource) => {
                log::info!("Zero-copy presentation enabled");
                self.state = InteropState::ZeroCopyActive;
                Some(resource)
            }
            Err(failure) => {
                log::warn!("Zero-copy unavailable, using buffer copies: {}", failure);
                self.state = InteropState::BufferCopyActive;
                self.failure = Some(failure);
                None
            }
        }
    }

    /// Skip probing; buffer-copy mode for the whole session.
    pub fn disable(&mut self) {
        if self.state == InteropState::Unprobed {
            log::info!("Zero-copy presentation disabled by configuration");
            self.state = InteropState::BufferCopyActive;
            self.failure = Some(InteropFailure::Disabled);
        }
    }

    /// Permanently fall back to buffer-copy mode after a first-use failure.
    ///
    /// Returns `true` if this call caused the transition.
    pub fn demote(&mut self, failure: InteropFailure) -> bool {
        if self.state == InteropState::BufferCopyActive {
            return false;
        }
        log::warn!("Zero-copy presentation failed, falling back to buffer copies: {}", failure);
        self.state = InteropState::BufferCopyActive;
        self.failure = Some(failure);
        true
    }
}

/// Current holder of the shared surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SurfaceOwner {
    Idle = 0,
    Device = 1,
    Display = 2,
}

impl SurfaceOwner {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SurfaceOwner::Device,
            2 => SurfaceOwner::Display,
            _ => SurfaceOwner::Idle,
        }
    }
}

impl fmt::Display for SurfaceOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceOwner::Idle => "nobody",
            SurfaceOwner::Device => "the compute device",
            SurfaceOwner::Display => "the display",
        };
        f.write_str(name)
    }
}

/// Ownership token alternating the shared surface between device and display.
#[derive(Debug, Default)]
pub struct SurfaceLease {
    owner: AtomicU8,
}

impl SurfaceLease {
    pub fn owner(&self) -> SurfaceOwner {
        SurfaceOwner::from_u8(self.owner.load(Ordering::Acquire))
    }

    /// Take the surface for `holder`. Fails if anyone else holds it.
    pub fn acquire(&self, holder: SurfaceOwner) -> Result<LeaseGuard<'_>, InteropFailure> {
        self.owner
            .compare_exchange(
                SurfaceOwner::Idle as u8,
                holder as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|actual| InteropFailure::Acquire(SurfaceOwner::from_u8(actual)))?;

        Ok(LeaseGuard {
            lease: self,
            holder,
            released: false,
        })
    }

    fn release_from(&self, holder: SurfaceOwner) -> Result<(), InteropFailure> {
        self.owner
            .compare_exchange(
                holder as u8,
                SurfaceOwner::Idle as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|actual| InteropFailure::Release(SurfaceOwner::from_u8(actual)))
    }
}

/// Held access to the shared surface. Dropping the guard releases it.
#[derive(Debug)]
pub struct LeaseGuard<'a> {
    lease: &'a SurfaceLease,
    holder: SurfaceOwner,
    released: bool,
}

impl LeaseGuard<'_> {
    pub fn holder(&self) -> SurfaceOwner {
        self.holder
    }

    /// Release explicitly, reporting a lost lease.
    pub fn release(mut self) -> Result<(), InteropFailure> {
        self.released = true;
        self.lease.release_from(self.holder)
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.lease.release_from(self.holder);
        }
    }
}

/// Check that a `width x height` grid can be copied straight into the surface.
pub fn check_surface_extent(
    width: u32,
    height: u32,
    max_dimension: u32,
) -> Result<(), InteropFailure> {
    if width > max_dimension || height > max_dimension {
        return Err(InteropFailure::TextureTooLarge {
            width,
            height,
            limit: max_dimension,
        });
    }

    let bytes_per_row = width * SURFACE_TEXEL_BYTES;
    let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    if bytes_per_row % alignment != 0 {
        return Err(InteropFailure::RowPitch {
            bytes_per_row,
            alignment,
        });
    }

    Ok(())
}

/// Texture shared between the compute engine and a renderer on the same device.
///
/// The renderer obtains it through `GpuPropagator::shared_surface` and must
/// hold a display lease while sampling it.
#[derive(Debug)]
pub struct SharedSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    lease: SurfaceLease,
    width: u32,
    height: u32,
}

impl SharedSurface {
    /// Create the surface texture, rejecting extents the device cannot copy into.
    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, InteropFailure> {
        check_surface_extent(width, height, device.limits().max_texture_dimension_2d)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shared Display Surface"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            lease: SurfaceLease::default(),
            width,
            height,
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    pub fn owner(&self) -> SurfaceOwner {
        self.lease.owner()
    }

    /// Take the surface for sampling by the display.
    pub fn acquire_for_display(&self) -> Result<LeaseGuard<'_>, InteropFailure> {
        self.lease.acquire(SurfaceOwner::Display)
    }

    pub(crate) fn acquire_for_device(&self) -> Result<LeaseGuard<'_>, InteropFailure> {
        self.lease.acquire(SurfaceOwner::Device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_success_enables_zero_copy() {
        let mut negotiator = InteropNegotiator::new();
        assert_eq!(negotiator.state(), InteropState::Unprobed);

        let resource = negotiator.probe(|| Ok(7));
        assert_eq!(resource, Some(7));
        assert_eq!(negotiator.state(), InteropState::ZeroCopyActive);
        assert!(negotiator.failure().is_none());
    }

    #[test]
    fn test_probe_failure_is_permanent() {
        let mut negotiator = InteropNegotiator::new();
        let failure = InteropFailure::RowPitch {
            bytes_per_row: 8,
            alignment: 256,
        };

        assert_eq!(negotiator.probe::<()>(|| Err(failure.clone())), None);
        assert_eq!(negotiator.state(), InteropState::BufferCopyActive);
        assert_eq!(negotiator.failure(), Some(&failure));

        // No re-probe, even if it would now succeed.
        let mut called = false;
        assert_eq!(
            negotiator.probe(|| {
                called = true;
                Ok(())
            }),
            None
        );
        assert!(!called);
        assert_eq!(negotiator.state(), InteropState::BufferCopyActive);
    }

    #[test]
    fn test_demotion_only_happens_once() {
        let mut negotiator = InteropNegotiator::new();
        negotiator.probe(|| Ok(()));

        assert!(negotiator.demote(InteropFailure::Acquire(SurfaceOwner::Display)));
        assert!(!negotiator.demote(InteropFailure::Release(SurfaceOwner::Idle)));
        assert_eq!(negotiator.state(), InteropState::BufferCopyActive);
        assert_eq!(
            negotiator.failure(),
            Some(&InteropFailure::Acquire(SurfaceOwner::Display))
        );
    }

    #[test]
    fn test_disable_skips_probe() {
        let mut negotiator = InteropNegotiator::new();
        negotiator.disable();
        assert_eq!(negotiator.state(), InteropState::BufferCopyActive);
        assert_eq!(negotiator.failure(), Some(&InteropFailure::Disabled));
        assert_eq!(negotiator.probe(|| Ok(())), None);
    }

    #[test]
    fn test_lease_alternates_between_holders() {
        let lease = SurfaceLease::default();
        assert_eq!(lease.owner(), SurfaceOwner::Idle);

        let device = lease.acquire(SurfaceOwner::Device).unwrap();
        assert_eq!(lease.owner(), SurfaceOwner::Device);
        assert_eq!(
            lease.acquire(SurfaceOwner::Display).unwrap_err(),
            InteropFailure::Acquire(SurfaceOwner::Device)
        );
        device.release().unwrap();

        let display = lease.acquire(SurfaceOwner::Display).unwrap();
        assert_eq!(
            lease.acquire(SurfaceOwner::Device).unwrap_err(),
            InteropFailure::Acquire(SurfaceOwner::Display)
        );
        drop(display);
        assert_eq!(lease.owner(), SurfaceOwner::Idle);
    }

    #[test]
    fn test_guard_releases_on_early_exit() {
        fn failing_copy(lease: &SurfaceLease) -> Result<(), InteropFailure> {
            let _guard = lease.acquire(SurfaceOwner::Device)?;
            Err(InteropFailure::Release(SurfaceOwner::Idle))
        }

        let lease = SurfaceLease::default();
        assert!(failing_copy(&lease).is_err());
        assert_eq!(lease.owner(), SurfaceOwner::Idle);
    }

    #[test]
    fn test_surface_extent_checks() {
        // 32 texels * 8 bytes = 256 bytes per row.
        assert!(check_surface_extent(32, 7, 8192).is_ok());
        assert!(check_surface_extent(512, 512, 8192).is_ok());
        assert_eq!(
            check_surface_extent(100, 100, 8192),
            Err(InteropFailure::RowPitch {
                bytes_per_row: 800,
                alignment: 256
            })
        );
        assert!(matches!(
            check_surface_extent(16384, 32, 8192),
            Err(InteropFailure::TextureTooLarge { .. })
        ));
    }
}
