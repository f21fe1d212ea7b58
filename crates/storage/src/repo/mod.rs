mod comments;
mod likes;
mod profiles;
