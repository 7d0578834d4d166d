pub mod evidence;
pub mod lexical;
pub mod markers;
pub mod rescue;
pub mod text;
