pub mod constructor;
pub mod detector;
pub mod grouper;
pub mod hedge;
pub mod scanner;
pub mod types;
