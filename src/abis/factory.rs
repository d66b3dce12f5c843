use alloy::sol;

sol! {
    event InstanceCreated(address indexed sender, address indexed instance, address indexed implementation);
}
