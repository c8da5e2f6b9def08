mod interaction;
mod map;
mod view;

pub(in crate::app) use interaction::hit_test_by;
#[cfg(test)]
pub(in crate::app) use view::compare_fill;
