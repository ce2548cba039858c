mod article;
mod note;

pub use article::{Article, NewArticle};
pub use note::{NewNote, Note};
