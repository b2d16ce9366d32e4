pub mod publish;
pub mod subscribe;
pub mod unsubscribe;
