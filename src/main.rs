fn main() {
    roost::main();
}
