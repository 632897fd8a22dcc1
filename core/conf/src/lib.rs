//! RepairDesk configuration object and helpers.
mod loading;
mod object;
mod runtime;

pub use self::loading::load;
pub use self::loading::Error;
pub use self::object::AccessConf;
pub use self::object::BackendConf;
pub use self::object::Conf;
pub use self::runtime::RuntimeConf;
