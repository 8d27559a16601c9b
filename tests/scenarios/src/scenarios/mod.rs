//! Multi-node scenarios for inperson sync.
//!
//! Organized by what they exercise:
//!
//! - `convergence` - CONV-* - responses and invites reach every holder
//! - `visibility` - VIS-* - Private and CanInvite audiences
//! - `authority` - AUTH-* - creator-owned content, past events, unknown senders
//! - `session` - SESS-* - disconnects, lost peers, periodic rebroadcast
//!
//! Every scenario runs in-process over the loopback transport.

pub mod authority;
pub mod convergence;
pub mod session;
pub mod visibility;
