//! Identifier definitions for the fairq monitor.

use crate::{define_generated_id, define_opaque_id};

define_opaque_id!(
    JobId,
    "Identifier of a submitted job, assigned by the queue service."
);

define_opaque_id!(
    QueueId,
    "Identifier of one shared hardware execution queue, assigned by the queue service."
);

define_generated_id!(ClientId, "mon");
