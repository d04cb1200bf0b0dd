pub(crate) mod answers;
pub(crate) mod auth;
pub(crate) mod courses;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod queues;
pub(crate) mod router;
pub(crate) mod tasks;
pub(crate) mod users;
