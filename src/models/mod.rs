pub mod log;
pub mod todo;

pub use log::{Action, LogEntry};
pub use todo::{NewTodoRequest, Todo, UpdateTodoRequest};
