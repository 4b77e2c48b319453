mod fixture;

mod read;
