pub mod booklet;
pub mod editor;
pub mod guest;
pub mod publication;
