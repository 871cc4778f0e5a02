pub(crate) mod emulate;
pub(crate) mod methods;

pub(crate) use emulate::{command_emulate, EmulateOptions};
pub(crate) use methods::command_methods;
