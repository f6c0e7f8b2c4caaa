pub mod fdsn;
