pub(crate) mod countdown;
pub(crate) mod link_store;
pub(crate) mod storage;
pub(crate) mod test_creation;
pub(crate) mod test_session;
pub(crate) mod uploads;
