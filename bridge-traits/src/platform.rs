//! Thread-safety markers shared by every bridge trait.
//!
//! Bridge implementations are handed to background loaders and to the
//! coordination task at the same time, so each trait requires `Send + Sync`
//! through [`PlatformSendSync`] instead of repeating the bounds.

/// Marker trait applying `Send + Sync`.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
