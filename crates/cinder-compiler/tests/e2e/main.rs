mod helpers;

mod test_classes;
mod test_errors;
mod test_expressions;
