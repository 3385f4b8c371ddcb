mod admittance;
mod controls;
mod indices;
mod jacobian;
mod support;
mod topology;
