pub(crate) mod access_policy;
pub(crate) mod answer_lifecycle;
pub(crate) mod answer_state;
pub(crate) mod course_metrics;
pub(crate) mod courses;
pub(crate) mod email;
pub(crate) mod error;
pub(crate) mod notifications;
pub(crate) mod preview;
pub(crate) mod review_assignments;
pub(crate) mod review_comments;
pub(crate) mod scope;
pub(crate) mod storage;
pub(crate) mod users;
