mod authors;
mod controls;
mod details;
mod panels;

pub(in crate::app) use authors::AuthorSearch;
pub(in crate::app) use controls::CategoryPicker;
pub(in crate::app) use details::TableSort;
