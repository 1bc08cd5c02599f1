pub mod haar_cascade;
pub mod haar_face_detector;
mod integral_image;
pub mod model_resolver;
