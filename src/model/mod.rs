pub mod reference;
pub mod work_item;
