pub mod builder;
pub mod calendar;
pub mod dates;
pub mod dialog;
pub mod outcome;
