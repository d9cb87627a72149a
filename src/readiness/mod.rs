pub mod checker;
pub mod conditions;
pub mod controller;
pub mod failure;
pub mod policy;
pub mod prerequisites;
pub mod reference;
pub mod replicas;
pub mod verifier;

pub use checker::{CheckSources, ConvergenceChecker, Verdict};
pub use conditions::{complete_condition_set, reduce, KnownCondition, TickOutcome};
pub use controller::{Listers, TickReport, WellKnownReadyController};
pub use failure::{CheckFailure, FailureClass};
pub use policy::{expected_minimum_replicas, metadata_is_operator_managed, quorum_satisfied};
pub use prerequisites::Prerequisites;
pub use reference::ReferenceSource;
pub use replicas::{target_port_for, ReplicaAddress, ReplicaEnumerator};
pub use verifier::verify_replica;
