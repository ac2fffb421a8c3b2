// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors returned by structural scene operations.

use crate::types::{ObjectId, SurfaceId};

/// Errors returned by structural [`Scene`](crate::Scene) operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// The handle does not refer to a live object.
    #[error("object {0:?} is stale or was never created")]
    StaleObject(ObjectId),
    /// The object exists but is not a group.
    #[error("object {0:?} is not a group")]
    NotAGroup(ObjectId),
    /// The operation would make a group contain itself.
    #[error("adding {member:?} to {group:?} would make the group contain itself")]
    WouldCycle {
        /// The receiving group.
        group: ObjectId,
        /// The object being added.
        member: ObjectId,
    },
    /// The surface handle is unknown.
    #[error("surface {0:?} does not exist")]
    UnknownSurface(SurfaceId),
    /// The receiving group's transform cannot be inverted, so objects cannot
    /// be re-expressed in its plane. `None` for a group being created.
    #[error("group {0:?} has a non-invertible transform")]
    SingularTransform(Option<ObjectId>),
    /// Only objects without an owner can be bound to a surface directly.
    #[error("object {0:?} has an owner and inherits its surface from it")]
    Nested(ObjectId),
}
